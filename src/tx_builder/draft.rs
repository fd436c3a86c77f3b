//! Draft transaction message under assembly
//!
//! A `DraftMessage` owns the caller's instructions, the fee payer and the
//! lifetime anchor. It is only mutable through
//! `append_budget_instructions`, which runs at most once, and it is consumed
//! by `sign`.

use solana_sdk::{
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};

use super::instructions::{budget_instructions, is_set_compute_unit_price, sanity_check_budget_order};
use super::output::SignedTransaction;
use crate::errors::{SmartTxError, SmartTxResult};
use crate::rpc::LifetimeAnchor;

#[derive(Debug, Clone)]
pub struct DraftMessage {
    instructions: Vec<Instruction>,
    fee_payer: Pubkey,
    anchor: LifetimeAnchor,
    budget_injected: bool,
}

impl DraftMessage {
    pub fn new(instructions: Vec<Instruction>, fee_payer: Pubkey, anchor: LifetimeAnchor) -> Self {
        Self {
            instructions,
            fee_payer,
            anchor,
            budget_injected: false,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn anchor(&self) -> &LifetimeAnchor {
        &self.anchor
    }

    pub fn has_compute_unit_price(&self) -> bool {
        self.instructions.iter().any(is_set_compute_unit_price)
    }

    /// Copy of this draft with one extra instruction, for simulation only
    pub fn with_appended(&self, ix: Instruction) -> Self {
        let mut draft = self.clone();
        draft.instructions.push(ix);
        draft
    }

    /// Append price and limit instructions after the caller's instructions
    ///
    /// Returns `false` and leaves the draft untouched if they were already
    /// appended.
    pub fn append_budget_instructions(&mut self, micro_lamports: u64, units: u32) -> bool {
        if self.budget_injected {
            return false;
        }
        self.instructions
            .extend(budget_instructions(micro_lamports, units));
        self.budget_injected = true;
        true
    }

    pub fn compile(&self) -> SmartTxResult<VersionedMessage> {
        let message = v0::Message::try_compile(
            &self.fee_payer,
            &self.instructions,
            &[],
            self.anchor.blockhash,
        )
        .map_err(|e| SmartTxError::Signing(format!("message compile failed: {}", e)))?;
        Ok(VersionedMessage::V0(message))
    }

    /// Unsigned transaction with placeholder signatures, as the node expects
    /// for `sigVerify: false` simulation
    pub fn to_simulation_transaction(&self) -> SmartTxResult<VersionedTransaction> {
        let message = self.compile()?;
        let num_signers = usize::from(message.header().num_required_signatures);
        Ok(VersionedTransaction {
            signatures: vec![Signature::default(); num_signers],
            message,
        })
    }

    /// Sign with the fee payer, consuming the draft
    pub fn sign(self, payer: &dyn Signer) -> SmartTxResult<SignedTransaction> {
        if payer.pubkey() != self.fee_payer {
            return Err(SmartTxError::Signing(format!(
                "signer {} is not the fee payer {}",
                payer.pubkey(),
                self.fee_payer
            )));
        }
        if self.budget_injected {
            sanity_check_budget_order(&self.instructions)?;
        }
        let message = self.compile()?;
        let tx = VersionedTransaction::try_new(message, &[payer])
            .map_err(|e| SmartTxError::Signing(e.to_string()))?;
        SignedTransaction::new(tx, self.anchor)
    }
}
