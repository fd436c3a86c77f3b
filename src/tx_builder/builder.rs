//! Smart transaction builder
//!
//! Pipeline:
//! 0. Refuse caller instructions that set a compute budget
//! 1. Fetch a lifetime anchor
//! 2. Assemble the draft from the caller's instructions
//! 3. Estimate priority fee and compute limit concurrently on that draft
//! 4. Append the two budget instructions
//! 5. Sign with the fee payer
//!
//! Both estimators borrow the draft immutably and are joined before the
//! budget instructions are appended, so they observe the same
//! instruction/account set.

use solana_sdk::{instruction::Instruction, signature::Signer};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::compute::ComputeEstimator;
use super::draft::DraftMessage;
use super::fee::FeeEstimator;
use super::instructions::reject_caller_budget_instructions;
use super::output::SignedTransaction;
use crate::errors::SmartTxResult;
use crate::metrics::Metrics;
use crate::observability::TraceContext;
use crate::rpc::{cancellable, LedgerRpc};

pub struct SmartTransactionBuilder {
    rpc: Arc<dyn LedgerRpc>,
    fee_estimator: FeeEstimator,
    compute_estimator: ComputeEstimator,
    metrics: Option<Arc<Metrics>>,
}

impl SmartTransactionBuilder {
    /// Builder whose fee strategy follows the client's cluster
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        let fee_estimator = FeeEstimator::for_cluster(rpc.cluster());
        Self {
            rpc,
            fee_estimator,
            compute_estimator: ComputeEstimator::new(),
            metrics: None,
        }
    }

    pub fn with_fee_estimator(mut self, fee_estimator: FeeEstimator) -> Self {
        self.fee_estimator = fee_estimator;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn fee_estimator(&self) -> &FeeEstimator {
        &self.fee_estimator
    }

    /// Build, price, budget and sign a transaction
    pub async fn build(
        &self,
        instructions: Vec<Instruction>,
        fee_payer: &dyn Signer,
        cancel: Option<&CancellationToken>,
    ) -> SmartTxResult<SignedTransaction> {
        self.build_traced(instructions, fee_payer, cancel, &TraceContext::new("build_smart_transaction"))
            .await
    }

    pub async fn build_traced(
        &self,
        instructions: Vec<Instruction>,
        fee_payer: &dyn Signer,
        cancel: Option<&CancellationToken>,
        trace: &TraceContext,
    ) -> SmartTxResult<SignedTransaction> {
        let started = Instant::now();
        let result = self.assemble(instructions, fee_payer, cancel, trace).await;

        match &result {
            Ok(signed) => {
                if let Some(metrics) = &self.metrics {
                    metrics.builds_total.inc();
                    metrics.build_latency.observe(started.elapsed().as_secs_f64());
                }
                info!(
                    trace_id = %trace.trace_id(),
                    span_id = %trace.span_id(),
                    parent_span_id = ?trace.parent_span_id(),
                    operation = trace.operation(),
                    signature = %signed.signature(),
                    last_valid_block_height = signed.anchor().last_valid_block_height,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Smart transaction built"
                );
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.build_failures.inc();
                }
                warn!(
                    trace_id = %trace.trace_id(),
                    span_id = %trace.span_id(),
                    parent_span_id = ?trace.parent_span_id(),
                    operation = trace.operation(),
                    error = %e,
                    category = e.category(),
                    "Smart transaction build failed"
                );
            }
        }
        result
    }

    async fn assemble(
        &self,
        instructions: Vec<Instruction>,
        fee_payer: &dyn Signer,
        cancel: Option<&CancellationToken>,
        trace: &TraceContext,
    ) -> SmartTxResult<SignedTransaction> {
        reject_caller_budget_instructions(&instructions)?;
        let rpc = self.rpc.as_ref();

        let anchor = cancellable(cancel, rpc.get_latest_anchor()).await?;
        debug!(
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            blockhash = %anchor.blockhash,
            last_valid_block_height = anchor.last_valid_block_height,
            "Lifetime anchor acquired"
        );

        let mut draft = DraftMessage::new(instructions, fee_payer.pubkey(), anchor);

        let (priority_fee, compute_units) = tokio::try_join!(
            self.fee_estimator.estimate(rpc, &draft, cancel),
            self.compute_estimator.estimate(rpc, &draft, cancel),
        )?;

        if let Some(metrics) = &self.metrics {
            metrics.priority_fee.observe(priority_fee as f64);
        }
        debug!(
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            priority_fee,
            compute_units,
            strategy = ?self.fee_estimator.strategy(),
            "Budget estimates resolved"
        );

        draft.append_budget_instructions(priority_fee, compute_units);
        draft.sign(fee_payer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SmartTxError;
    use crate::rpc::Cluster;
    use crate::test_utils::{budget_of, decompile_instructions, MockLedgerRpc};
    use crate::tx_builder::instructions::{is_set_compute_unit_limit, is_set_compute_unit_price};
    use crate::tx_builder::FeeStrategy;
    use solana_sdk::{
        compute_budget::ComputeBudgetInstruction,
        instruction::AccountMeta,
        pubkey::Pubkey,
        signature::Keypair,
        system_instruction,
    };

    fn transfer(payer: &Keypair, lamports: u64) -> Instruction {
        system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), lamports)
    }

    #[tokio::test]
    async fn test_build_devnet_median_fee_and_margin() {
        let rpc = Arc::new(
            MockLedgerRpc::new(Cluster::Devnet)
                .with_recent_fees(vec![5, 0, 10, 3, 0])
                .with_simulated_units(1_000),
        );
        let builder = SmartTransactionBuilder::new(rpc.clone());
        let payer = Keypair::new();

        let signed = builder.build(vec![transfer(&payer, 1)], &payer, None).await.unwrap();

        assert_eq!(budget_of(&signed), Some((5, 1_100)));
        assert_eq!(rpc.recommended_fee_calls(), 0);
    }

    #[tokio::test]
    async fn test_build_mainnet_uses_recommendation() {
        let rpc = Arc::new(
            MockLedgerRpc::new(Cluster::Mainnet)
                .with_recommended_fee(7_777)
                .with_simulated_units(200),
        );
        let builder = SmartTransactionBuilder::new(rpc.clone());
        assert_eq!(builder.fee_estimator().strategy(), FeeStrategy::ServiceEstimate);

        let payer = Keypair::new();
        let signed = builder.build(vec![transfer(&payer, 1)], &payer, None).await.unwrap();

        assert_eq!(budget_of(&signed), Some((7_777, 220)));
        assert_eq!(rpc.recent_fee_calls(), 0);
    }

    #[tokio::test]
    async fn test_estimators_see_same_account_set() {
        let rpc = Arc::new(MockLedgerRpc::new(Cluster::Devnet).with_simulated_units(10));
        let builder = SmartTransactionBuilder::new(rpc.clone());
        let payer = Keypair::new();
        let writable = Pubkey::new_unique();
        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1],
            vec![
                AccountMeta::new(writable, false),
                AccountMeta::new_readonly(Pubkey::new_unique(), false),
            ],
        );

        builder.build(vec![ix], &payer, None).await.unwrap();

        assert_eq!(rpc.fee_account_queries(), vec![vec![writable]]);

        // Caller instruction plus the zero-fee placeholder, no limit yet
        let simulated = rpc.simulated_transactions();
        assert_eq!(simulated.len(), 1);
        let sim_ixs = decompile_instructions(&simulated[0]);
        assert_eq!(sim_ixs.len(), 2);
        assert!(is_set_compute_unit_price(&sim_ixs[1]));
    }

    #[tokio::test]
    async fn test_budget_follows_caller_instructions() {
        let rpc = Arc::new(
            MockLedgerRpc::new(Cluster::Devnet)
                .with_recent_fees(vec![3])
                .with_simulated_units(450),
        );
        let builder = SmartTransactionBuilder::new(rpc);
        let payer = Keypair::new();
        let (a, b) = (transfer(&payer, 1), transfer(&payer, 2));

        let signed = builder
            .build(vec![a.clone(), b.clone()], &payer, None)
            .await
            .unwrap();
        let ixs = decompile_instructions(signed.transaction());

        assert_eq!(ixs.len(), 4);
        assert_eq!(ixs[0].data, a.data);
        assert_eq!(ixs[1].data, b.data);
        assert!(is_set_compute_unit_price(&ixs[2]));
        assert!(is_set_compute_unit_limit(&ixs[3]));
        assert_eq!(budget_of(&signed), Some((3, 495)));
    }

    #[tokio::test]
    async fn test_caller_budget_instruction_rejected_before_any_rpc() {
        let payer = Keypair::new();
        let caller_budgets = [
            ComputeBudgetInstruction::set_compute_unit_price(1),
            ComputeBudgetInstruction::set_compute_unit_limit(50_000),
        ];

        for budget_ix in caller_budgets {
            let rpc = Arc::new(MockLedgerRpc::new(Cluster::Devnet));
            let metrics = Arc::new(Metrics::new().unwrap());
            let builder = SmartTransactionBuilder::new(rpc.clone()).with_metrics(metrics.clone());

            let err = builder
                .build(vec![transfer(&payer, 1), budget_ix], &payer, None)
                .await
                .unwrap_err();

            assert!(matches!(err, SmartTxError::InvalidInstructions(_)));
            assert!(err.is_build_failure());
            assert_eq!(err.category(), "instructions");
            assert_eq!(rpc.anchor_calls(), 0);
            assert_eq!(rpc.recent_fee_calls(), 0);
            assert!(rpc.simulated_transactions().is_empty());
            assert_eq!(metrics.build_failures.get(), 1);
        }
    }

    #[tokio::test]
    async fn test_estimator_failure_aborts_build() {
        let rpc = Arc::new(
            MockLedgerRpc::new(Cluster::Devnet).with_simulation_error("program failed"),
        );
        let metrics = Arc::new(Metrics::new().unwrap());
        let builder = SmartTransactionBuilder::new(rpc).with_metrics(metrics.clone());
        let payer = Keypair::new();

        let err = builder
            .build(vec![transfer(&payer, 1)], &payer, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartTxError::Simulation(_)));
        assert!(err.is_build_failure());
        assert_eq!(metrics.build_failures.get(), 1);
        assert_eq!(metrics.builds_total.get(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_build() {
        let rpc = Arc::new(MockLedgerRpc::new(Cluster::Devnet).with_hanging_simulation());
        let builder = SmartTransactionBuilder::new(rpc);
        let payer = Keypair::new();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });

        let err = builder
            .build(vec![transfer(&payer, 1)], &payer, Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, SmartTxError::Cancelled));
    }
}
