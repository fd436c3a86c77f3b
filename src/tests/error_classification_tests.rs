//! Client error classification
//!
//! Maps `solana_client` errors from each RPC method onto the error
//! taxonomy, with focus on the already-processed race.

use crate::errors::SmartTxError;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::transaction::TransactionError;

fn custom(msg: &str) -> ClientError {
    ClientError::from(ClientErrorKind::Custom(msg.to_string()))
}

#[test]
fn test_already_processed_from_preflight_message() {
    let err = custom("Transaction simulation failed: This transaction has already been processed");
    assert!(matches!(
        SmartTxError::from_client_error(err, "sendTransaction"),
        SmartTxError::AlreadyProcessed
    ));
}

#[test]
fn test_send_with_transaction_error_is_submission() {
    let err = ClientError::from(ClientErrorKind::TransactionError(
        TransactionError::InsufficientFundsForFee,
    ));
    let classified = SmartTxError::from_client_error(err, "sendTransaction");
    assert!(matches!(classified, SmartTxError::Submission(_)));
    assert!(!classified.is_retryable());
    assert!(!classified.is_build_failure());
}

#[test]
fn test_estimation_methods_abort_build() {
    for (operation, category) in [
        ("getLatestBlockhash", "blockhash"),
        ("getRecentPrioritizationFees", "fee"),
        ("simulateTransaction", "simulation"),
    ] {
        let classified = SmartTxError::from_client_error(custom("connection reset"), operation);
        assert_eq!(classified.category(), category, "{}", operation);
        assert!(classified.is_build_failure(), "{}", operation);
    }
}

#[test]
fn test_stale_blockhash_on_send_is_fatal() {
    let classified = SmartTxError::from_client_error(custom("Blockhash not found"), "sendTransaction");
    assert!(matches!(classified, SmartTxError::Submission(_)));
}

#[test]
fn test_anyhow_errors_wrap_as_external() {
    let err: SmartTxError = anyhow::anyhow!("disk full").into();
    assert_eq!(err.category(), "external");
    assert!(err.to_string().contains("disk full"));
}
