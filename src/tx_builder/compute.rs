//! Compute unit estimation by simulation
//!
//! The simulated draft must contain the budget instructions' own cost. The
//! limit instruction is not there yet at estimation time, so a zero-fee
//! `SetComputeUnitPrice` placeholder stands in for the price instruction
//! when the caller did not supply one.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::draft::DraftMessage;
use super::instructions::MAX_COMPUTE_UNIT_LIMIT;
use crate::errors::SmartTxResult;
use crate::rpc::{cancellable, LedgerRpc};

/// `ceil(units * 1.1)` in integer arithmetic, clamped to the runtime maximum
///
/// The clamp is the only place the result departs from the plain 10%
/// margin: the runtime rejects a `SetComputeUnitLimit` above
/// `MAX_COMPUTE_UNIT_LIMIT`, so a margin past it would fail the whole
/// transaction instead of buying headroom.
pub fn apply_safety_margin(units_consumed: u64) -> u32 {
    let with_margin = units_consumed.saturating_mul(11).saturating_add(9) / 10;
    u32::try_from(with_margin)
        .unwrap_or(u32::MAX)
        .min(MAX_COMPUTE_UNIT_LIMIT)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeEstimator;

impl ComputeEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Draft as it will be simulated
    pub fn simulation_draft(draft: &DraftMessage) -> DraftMessage {
        if draft.has_compute_unit_price() {
            draft.clone()
        } else {
            draft.with_appended(ComputeBudgetInstruction::set_compute_unit_price(0))
        }
    }

    /// Compute unit limit for `draft`, margin included
    pub async fn estimate(
        &self,
        rpc: &dyn LedgerRpc,
        draft: &DraftMessage,
        cancel: Option<&CancellationToken>,
    ) -> SmartTxResult<u32> {
        let sim_tx = Self::simulation_draft(draft).to_simulation_transaction()?;
        let units_consumed = cancellable(cancel, rpc.simulate_compute_units(&sim_tx)).await?;
        let limit = apply_safety_margin(units_consumed);

        debug!(
            simulated_cu = units_consumed,
            cu_limit = limit,
            "CU estimation from simulation"
        );
        Ok(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::LifetimeAnchor;
    use solana_sdk::{
        hash::Hash,
        instruction::Instruction,
        pubkey::Pubkey,
    };

    fn draft(instructions: Vec<Instruction>) -> DraftMessage {
        let anchor = LifetimeAnchor {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 10,
        };
        DraftMessage::new(instructions, Pubkey::new_unique(), anchor)
    }

    #[test]
    fn test_margin_rounds_up() {
        assert_eq!(apply_safety_margin(1000), 1100);
        assert_eq!(apply_safety_margin(1001), 1102);
        assert_eq!(apply_safety_margin(0), 0);
    }

    #[test]
    fn test_margin_clamped_to_runtime_max() {
        // Plain margin right below the ceiling, then the clamp takes over
        assert_eq!(apply_safety_margin(1_272_726), 1_399_999);
        assert_eq!(apply_safety_margin(1_272_728), MAX_COMPUTE_UNIT_LIMIT);
        assert_eq!(apply_safety_margin(1_390_000), MAX_COMPUTE_UNIT_LIMIT);
        assert_eq!(apply_safety_margin(u64::MAX), MAX_COMPUTE_UNIT_LIMIT);
    }

    #[test]
    fn test_placeholder_added_when_price_missing() {
        let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[7], vec![]);
        let sim = ComputeEstimator::simulation_draft(&draft(vec![ix]));
        assert_eq!(sim.instructions().len(), 2);
        assert!(sim.has_compute_unit_price());
    }

    #[test]
    fn test_no_placeholder_when_price_present() {
        let ix = Instruction::new_with_bytes(Pubkey::new_unique(), &[7], vec![]);
        let price = ComputeBudgetInstruction::set_compute_unit_price(77);
        let sim = ComputeEstimator::simulation_draft(&draft(vec![ix, price]));
        assert_eq!(sim.instructions().len(), 2);
    }
}
