//! Error types for the smart transaction pipeline
//!
//! One taxonomy covers both halves of the pipeline:
//! - Build failures: rejected caller instructions, blockhash, fee
//!   estimation, simulation, signing
//! - Submission failures: RPC rejections, failed or expired transactions
//!
//! `AlreadyProcessed` is matched by the submitter and turned into a
//! confirmation wait. It never reaches a caller of `RetryingSubmitter::send`.
//! An attempt that runs out of time is not an error at all; it feeds the
//! retry loop and ends in `SubmitOutcome::Exhausted`.

use solana_client::client_error::ClientError;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// Error type for every smart transaction operation
#[derive(Error, Debug)]
pub enum SmartTxError {
    /// The caller's instructions cannot be budgeted as given
    ///
    /// Compute budget instructions are owned by the builder, so a caller
    /// list that already sets a price or a limit is refused before any
    /// network call.
    #[error("Invalid instructions: {0}")]
    InvalidInstructions(String),

    /// Failed to fetch a recent blockhash (lifetime anchor)
    #[error("Blockhash error: {0}")]
    Blockhash(String),

    /// Priority fee query failed
    #[error("Fee estimation failed: {0}")]
    FeeEstimation(String),

    /// Compute unit simulation failed or returned no usable result
    ///
    /// This can indicate:
    /// - A program error in one of the caller's instructions
    /// - Insufficient funds in the fee payer
    /// - A node that does not report `unitsConsumed`
    #[error("Simulation failed: {0}")]
    Simulation(String),

    /// Failed to compile or sign the transaction message
    #[error("Signing failed: {0}")]
    Signing(String),

    /// RPC transport or response error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The network rejected the submission
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// The transaction landed but failed on-chain
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The network already processed this exact transaction
    #[error("Transaction already processed")]
    AlreadyProcessed,

    /// The chain advanced past the blockhash's last valid block height
    #[error("Transaction expired: block height {block_height} exceeded last valid {last_valid_block_height}")]
    Expired {
        block_height: u64,
        last_valid_block_height: u64,
    },

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// The client's cluster does not offer this capability
    #[error("Unsupported on {cluster}: {method}")]
    Unsupported { cluster: String, method: String },

    /// Invalid configuration or arguments
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed response from a provider-specific method
    #[error("Decode error for {method}: {reason}")]
    Decode { method: String, reason: String },

    /// All attempts were spent without a confirmation or an error
    #[error("Submission outcome unknown after {attempts} attempts")]
    Indeterminate { attempts: u32 },

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl SmartTxError {
    /// Whether rebuilding with a fresh blockhash and resending might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blockhash(_) => true,
            Self::FeeEstimation(_) => true,
            Self::Rpc(_) => true,
            Self::Expired { .. } => true,
            Self::Indeterminate { .. } => true,
            Self::Simulation(msg) => !msg.contains("insufficient"),

            Self::InvalidInstructions(_) => false,
            Self::Signing(_) => false,
            Self::Submission(_) => false,
            Self::TransactionFailed(_) => false,
            Self::AlreadyProcessed => false,
            Self::Cancelled => false,
            Self::Unsupported { .. } => false,
            Self::Configuration(_) => false,
            Self::Decode { .. } => false,
            Self::External(_) => false,
        }
    }

    /// True for errors raised while assembling a transaction, before anything was sent
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstructions(_)
                | Self::Blockhash(_)
                | Self::FeeEstimation(_)
                | Self::Simulation(_)
                | Self::Signing(_)
                | Self::Unsupported { .. }
                | Self::Decode { .. }
        )
    }

    /// Get the error category for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInstructions(_) => "instructions",
            Self::Blockhash(_) => "blockhash",
            Self::FeeEstimation(_) => "fee",
            Self::Simulation(_) => "simulation",
            Self::Signing(_) => "signing",
            Self::Rpc(_) => "rpc",
            Self::Submission(_) => "submission",
            Self::TransactionFailed(_) => "transaction",
            Self::AlreadyProcessed => "already_processed",
            Self::Expired { .. } => "expired",
            Self::Cancelled => "cancelled",
            Self::Unsupported { .. } => "unsupported",
            Self::Configuration(_) => "config",
            Self::Decode { .. } => "decode",
            Self::Indeterminate { .. } => "indeterminate",
            Self::External(_) => "external",
        }
    }

    /// Map a `solana_client` error raised by `operation` into the taxonomy
    ///
    /// The already-processed race is detected from the structured
    /// transaction error first and from the message as a fallback, since
    /// some providers only forward the preflight log text.
    pub fn from_client_error(err: ClientError, operation: &str) -> Self {
        match err.get_transaction_error() {
            Some(TransactionError::AlreadyProcessed) => return Self::AlreadyProcessed,
            Some(tx_err) if operation == "sendTransaction" => {
                return Self::Submission(format!("{}: {}", tx_err, err))
            }
            _ => {}
        }

        let err_str = err.to_string().to_lowercase();
        if err_str.contains("already been processed") || err_str.contains("alreadyprocessed") {
            Self::AlreadyProcessed
        } else if err_str.contains("blockhash not found") && operation == "sendTransaction" {
            Self::Submission(err.to_string())
        } else {
            match operation {
                "getLatestBlockhash" => Self::Blockhash(err.to_string()),
                "getRecentPrioritizationFees" => Self::FeeEstimation(err.to_string()),
                "simulateTransaction" => Self::Simulation(err.to_string()),
                _ => Self::Rpc(format!("{}: {}", operation, err)),
            }
        }
    }
}

// Convenience constructors for common error scenarios
impl SmartTxError {
    pub fn unsupported(cluster: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Unsupported {
            cluster: cluster.into(),
            method: method.into(),
        }
    }

    pub fn decode(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn simulation_failed(reason: impl Into<String>) -> Self {
        Self::Simulation(reason.into())
    }
}

/// Result type for smart transaction operations
pub type SmartTxResult<T> = Result<T, SmartTxError>;
