//! Smart transaction builder
//!
//! Turns a caller's instruction list into a signed, priced and
//! compute-budgeted v0 transaction.
//!
//! ## Modules
//!
//! - **draft**: the message under assembly, appended to exactly once
//! - **instructions**: compute budget instruction helpers and ordering checks
//! - **fee**: priority fee estimation, strategy picked per cluster
//! - **compute**: compute unit estimation by simulation
//! - **output**: the immutable signed result with its wire bytes
//! - **builder**: the pipeline tying the above together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use smart_transaction::rpc::{HeliusParams, HeliusRpc};
//! use smart_transaction::tx_builder::SmartTransactionBuilder;
//! use solana_sdk::{signature::{Keypair, Signer}, system_instruction};
//! use std::sync::Arc;
//!
//! # async fn example() -> smart_transaction::errors::SmartTxResult<()> {
//! let payer = Keypair::new();
//! let rpc = Arc::new(HeliusRpc::devnet(HeliusParams::ApiKey("key".into())));
//! let builder = SmartTransactionBuilder::new(rpc);
//!
//! let ix = system_instruction::transfer(&payer.pubkey(), &payer.pubkey(), 1_000);
//! let signed = builder.build(vec![ix], &payer, None).await?;
//! println!("{}", signed.signature());
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod compute;
mod draft;
pub mod fee;
pub mod instructions;
mod output;

pub use builder::SmartTransactionBuilder;
pub use compute::{apply_safety_margin, ComputeEstimator};
pub use draft::DraftMessage;
pub use fee::{lower_median_nonzero, FeeEstimator, FeeStrategy, DEFAULT_PRIORITY_FEE};
pub use instructions::{budget_instructions, sanity_check_budget_order, MAX_COMPUTE_UNIT_LIMIT};
pub use output::SignedTransaction;
