//! Compute budget instruction helpers and ordering validation
//!
//! Budget instructions always follow the caller's instructions, price first:
//! 1. Caller instructions, in caller order
//! 2. `SetComputeUnitPrice`
//! 3. `SetComputeUnitLimit`

use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::Instruction,
    pubkey::Pubkey,
};
use std::collections::BTreeSet;

use crate::errors::{SmartTxError, SmartTxResult};

/// Runtime ceiling for a single transaction's compute unit limit
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

// Borsh enum discriminators of ComputeBudgetInstruction
const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

fn is_budget_ix_with_tag(ix: &Instruction, tag: u8) -> bool {
    ix.program_id == compute_budget::id() && ix.data.first() == Some(&tag)
}

pub fn is_set_compute_unit_price(ix: &Instruction) -> bool {
    is_budget_ix_with_tag(ix, SET_COMPUTE_UNIT_PRICE_TAG)
}

pub fn is_set_compute_unit_limit(ix: &Instruction) -> bool {
    is_budget_ix_with_tag(ix, SET_COMPUTE_UNIT_LIMIT_TAG)
}

/// The two budget instructions, price then limit
pub fn budget_instructions(micro_lamports: u64, units: u32) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_price(micro_lamports),
        ComputeBudgetInstruction::set_compute_unit_limit(units),
    ]
}

/// Accounts written by any instruction, deduplicated
///
/// Read-only accounts never contend for write locks, so they carry no
/// signal for priority fees.
pub fn writable_accounts(instructions: &[Instruction]) -> BTreeSet<Pubkey> {
    instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .filter(|meta| meta.is_writable)
        .map(|meta| meta.pubkey)
        .collect()
}

/// Refuse caller instructions that already carry a compute budget
///
/// The builder appends exactly one price and one limit instruction. A
/// caller-supplied one would either duplicate them or be overridden
/// silently, depending on its position.
pub fn reject_caller_budget_instructions(instructions: &[Instruction]) -> SmartTxResult<()> {
    for (index, ix) in instructions.iter().enumerate() {
        let kind = if is_set_compute_unit_price(ix) {
            "SetComputeUnitPrice"
        } else if is_set_compute_unit_limit(ix) {
            "SetComputeUnitLimit"
        } else {
            continue;
        };
        return Err(SmartTxError::InvalidInstructions(format!(
            "instruction {} is a {}; compute budget instructions are added by the builder",
            index, kind
        )));
    }
    Ok(())
}

/// Validate that a budgeted instruction list ends with exactly one price
/// and one limit instruction, in that order
pub fn sanity_check_budget_order(instructions: &[Instruction]) -> SmartTxResult<()> {
    let n = instructions.len();
    if n < 2 {
        return Err(SmartTxError::Configuration(format!(
            "budgeted transaction needs at least 2 instructions, got {}",
            n
        )));
    }
    if !is_set_compute_unit_price(&instructions[n - 2]) || !is_set_compute_unit_limit(&instructions[n - 1]) {
        return Err(SmartTxError::Configuration(
            "budget instructions must be the last two, price then limit".to_string(),
        ));
    }
    let limits = instructions.iter().filter(|ix| is_set_compute_unit_limit(ix)).count();
    if limits != 1 {
        return Err(SmartTxError::Configuration(format!(
            "expected exactly one SetComputeUnitLimit, found {}",
            limits
        )));
    }
    Ok(())
}
