//! Smart transactions for Solana
//!
//! Builds transactions that carry a priority fee and a compute unit limit
//! derived from the network, then submits them with a bounded
//! send-and-confirm loop.
//!
//! - [`tx_builder::SmartTransactionBuilder`] assembles, prices, budgets and signs
//! - [`submit::RetryingSubmitter`] sends the signed bytes and waits for confirmation
//! - [`rpc::LedgerRpc`] is the network seam; [`rpc::HeliusRpc`] implements it

pub mod config;
pub mod errors;
pub mod metrics;
pub mod observability;
pub mod rpc;
pub mod submit;
pub mod test_utils;
pub mod tx_builder;
pub mod wallet;

pub use config::Config;
pub use errors::{SmartTxError, SmartTxResult};
pub use rpc::{Cluster, HeliusParams, HeliusRpc, LedgerRpc, LifetimeAnchor};
pub use submit::{RetryingSubmitter, SubmitOptions, SubmitOutcome};
pub use tx_builder::{SignedTransaction, SmartTransactionBuilder};

// Re-export commonly used types
pub use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
