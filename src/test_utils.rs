//! Test Utilities Module
//!
//! `MockLedgerRpc` is a scripted, in-memory `LedgerRpc` that records every
//! call so tests can assert on what the pipeline asked the network for.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{SmartTxError, SmartTxResult};
use crate::rpc::{Cluster, LedgerRpc, LifetimeAnchor, SendOptions, SubmissionHandle};
use crate::tx_builder::instructions::{is_set_compute_unit_limit, is_set_compute_unit_price};
use crate::tx_builder::SignedTransaction;

/// What the mock network does with one send-and-confirm attempt
#[derive(Debug, Clone)]
pub enum AttemptScript {
    /// Accepted and confirmed right away
    Confirm,
    /// Accepted, but confirmation never arrives
    Hang,
    /// Rejected at submission as already processed
    AlreadyProcessed,
    /// Rejected at submission with an RPC error
    Reject(String),
    /// Accepted, then fails on chain
    FailOnChain(String),
}

enum SimulationScript {
    Units(u64),
    Error(String),
    Hang,
}

pub struct MockLedgerRpc {
    cluster: Cluster,
    anchor: LifetimeAnchor,
    recent_fees: Vec<u64>,
    recommended_fee: u64,
    simulation: SimulationScript,
    attempts: Mutex<VecDeque<AttemptScript>>,
    /// Used once the attempt script runs out
    default_attempt: AttemptScript,
    current_attempt: Mutex<Option<AttemptScript>>,

    anchor_calls: AtomicUsize,
    recent_fee_calls: AtomicUsize,
    recommended_fee_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
    fee_account_queries: Mutex<Vec<Vec<Pubkey>>>,
    simulated: Mutex<Vec<VersionedTransaction>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    send_options: Mutex<Vec<SendOptions>>,
}

impl MockLedgerRpc {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            anchor: LifetimeAnchor {
                blockhash: Hash::new_unique(),
                last_valid_block_height: 1_000,
            },
            recent_fees: Vec::new(),
            recommended_fee: 0,
            simulation: SimulationScript::Units(5_000),
            attempts: Mutex::new(VecDeque::new()),
            default_attempt: AttemptScript::Confirm,
            current_attempt: Mutex::new(None),
            anchor_calls: AtomicUsize::new(0),
            recent_fee_calls: AtomicUsize::new(0),
            recommended_fee_calls: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
            fee_account_queries: Mutex::new(Vec::new()),
            simulated: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            send_options: Mutex::new(Vec::new()),
        }
    }

    pub fn with_recent_fees(mut self, fees: Vec<u64>) -> Self {
        self.recent_fees = fees;
        self
    }

    pub fn with_recommended_fee(mut self, fee: u64) -> Self {
        self.recommended_fee = fee;
        self
    }

    pub fn with_simulated_units(mut self, units: u64) -> Self {
        self.simulation = SimulationScript::Units(units);
        self
    }

    pub fn with_simulation_error(mut self, reason: &str) -> Self {
        self.simulation = SimulationScript::Error(reason.to_string());
        self
    }

    pub fn with_hanging_simulation(mut self) -> Self {
        self.simulation = SimulationScript::Hang;
        self
    }

    /// Per-attempt behaviour, consumed in order
    pub fn with_attempts(self, script: Vec<AttemptScript>) -> Self {
        *self.attempts.lock() = script.into();
        self
    }

    /// Behaviour of every attempt after the script runs out
    pub fn with_default_attempt(mut self, attempt: AttemptScript) -> Self {
        self.default_attempt = attempt;
        self
    }

    pub fn anchor_calls(&self) -> usize {
        self.anchor_calls.load(Ordering::SeqCst)
    }

    pub fn recent_fee_calls(&self) -> usize {
        self.recent_fee_calls.load(Ordering::SeqCst)
    }

    pub fn recommended_fee_calls(&self) -> usize {
        self.recommended_fee_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn fee_account_queries(&self) -> Vec<Vec<Pubkey>> {
        self.fee_account_queries.lock().clone()
    }

    pub fn simulated_transactions(&self) -> Vec<VersionedTransaction> {
        self.simulated.lock().clone()
    }

    /// Wire bytes of every submission, in order
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().clone()
    }

    pub fn send_options(&self) -> Vec<SendOptions> {
        self.send_options.lock().clone()
    }
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    fn cluster(&self) -> Cluster {
        self.cluster
    }

    async fn get_latest_anchor(&self) -> SmartTxResult<LifetimeAnchor> {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.anchor)
    }

    async fn get_recent_priority_fees(&self, accounts: &[Pubkey]) -> SmartTxResult<Vec<u64>> {
        self.recent_fee_calls.fetch_add(1, Ordering::SeqCst);
        self.fee_account_queries.lock().push(accounts.to_vec());
        Ok(self.recent_fees.clone())
    }

    async fn get_recommended_priority_fee(&self, accounts: &[Pubkey]) -> SmartTxResult<u64> {
        if self.cluster != Cluster::Mainnet {
            return Err(SmartTxError::unsupported(
                self.cluster.as_str(),
                "getPriorityFeeEstimate",
            ));
        }
        self.recommended_fee_calls.fetch_add(1, Ordering::SeqCst);
        self.fee_account_queries.lock().push(accounts.to_vec());
        Ok(self.recommended_fee)
    }

    async fn simulate_compute_units(&self, tx: &VersionedTransaction) -> SmartTxResult<u64> {
        self.simulated.lock().push(tx.clone());
        match &self.simulation {
            SimulationScript::Units(units) => Ok(*units),
            SimulationScript::Error(reason) => Err(SmartTxError::simulation_failed(reason.clone())),
            SimulationScript::Hang => futures::future::pending().await,
        }
    }

    async fn submit(
        &self,
        tx: &SignedTransaction,
        options: SendOptions,
    ) -> SmartTxResult<SubmissionHandle> {
        self.submitted.lock().push(tx.wire_bytes().to_vec());
        self.send_options.lock().push(options);

        let attempt = self
            .attempts
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_attempt.clone());

        match attempt {
            AttemptScript::AlreadyProcessed => Err(SmartTxError::AlreadyProcessed),
            AttemptScript::Reject(reason) => Err(SmartTxError::Submission(reason)),
            accepted => {
                *self.current_attempt.lock() = Some(accepted);
                Ok(SubmissionHandle {
                    signature: tx.signature(),
                    last_valid_block_height: tx.anchor().last_valid_block_height,
                })
            }
        }
    }

    async fn await_confirmation(
        &self,
        _handle: &SubmissionHandle,
        _commitment: CommitmentConfig,
    ) -> SmartTxResult<()> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = self.current_attempt.lock().take();
        match attempt {
            Some(AttemptScript::Hang) => futures::future::pending().await,
            Some(AttemptScript::FailOnChain(reason)) => Err(SmartTxError::TransactionFailed(reason)),
            _ => Ok(()),
        }
    }
}

/// Program id and data of each compiled instruction
///
/// Account metas are left empty; tests only inspect program and payload.
pub fn decompile_instructions(tx: &VersionedTransaction) -> Vec<Instruction> {
    let keys = tx.message.static_account_keys();
    tx.message
        .instructions()
        .iter()
        .map(|ix| Instruction {
            program_id: keys[usize::from(ix.program_id_index)],
            accounts: Vec::new(),
            data: ix.data.clone(),
        })
        .collect()
}

/// `(micro_lamports, units)` from the budget instructions of a signed transaction
pub fn budget_of(signed: &SignedTransaction) -> Option<(u64, u32)> {
    let ixs = decompile_instructions(signed.transaction());
    let price = ixs
        .iter()
        .rev()
        .find(|ix| is_set_compute_unit_price(ix))
        .and_then(|ix| ix.data.get(1..9))
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)?;
    let limit = ixs
        .iter()
        .find(|ix| is_set_compute_unit_limit(ix))
        .and_then(|ix| ix.data.get(1..5))
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)?;
    Some((price, limit))
}
