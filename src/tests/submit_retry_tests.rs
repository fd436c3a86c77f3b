//! Retry loop behaviour under paused time

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{
    commitment_config::CommitmentConfig,
    signature::{Keypair, Signer},
    system_instruction,
};

use crate::errors::SmartTxError;
use crate::metrics::Metrics;
use crate::rpc::Cluster;
use crate::submit::{RetryingSubmitter, SubmitOptions, SubmitOutcome};
use crate::test_utils::{AttemptScript, MockLedgerRpc};
use crate::tx_builder::{SignedTransaction, SmartTransactionBuilder};

async fn build(rpc: Arc<MockLedgerRpc>) -> SignedTransaction {
    let payer = Keypair::new();
    let ix = system_instruction::transfer(&payer.pubkey(), &payer.pubkey(), 1_000);
    SmartTransactionBuilder::new(rpc)
        .build(vec![ix], &payer, None)
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_custom_budget_and_timeout() {
    let rpc = Arc::new(MockLedgerRpc::new(Cluster::Devnet).with_default_attempt(AttemptScript::Hang));
    let signed = build(rpc.clone()).await;
    let options = SubmitOptions {
        retries: 2,
        attempt_timeout: Duration::from_secs(3),
        ..SubmitOptions::default()
    };

    let started = tokio::time::Instant::now();
    let outcome = RetryingSubmitter::new(rpc.clone(), options)
        .send(&signed, None)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmitOutcome::Exhausted { attempts: 2, .. }));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    assert!(matches!(
        outcome.require_confirmed(),
        Err(SmartTxError::Indeterminate { attempts: 2 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_on_chain_failure_is_fatal() {
    let rpc = Arc::new(
        MockLedgerRpc::new(Cluster::Devnet).with_attempts(vec![
            AttemptScript::Hang,
            AttemptScript::FailOnChain("InstructionError(0, Custom(1))".into()),
        ]),
    );
    let signed = build(rpc.clone()).await;
    let metrics = Arc::new(Metrics::new().unwrap());

    let err = RetryingSubmitter::new(rpc.clone(), SubmitOptions::default())
        .with_metrics(metrics.clone())
        .send(&signed, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SmartTxError::TransactionFailed(_)));
    assert_eq!(rpc.submitted().len(), 2);
    assert_eq!(metrics.fatal_errors.get(), 1);
    assert_eq!(metrics.exhausted.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_already_processed_counted() {
    let rpc = Arc::new(
        MockLedgerRpc::new(Cluster::Devnet)
            .with_attempts(vec![AttemptScript::Hang, AttemptScript::Hang, AttemptScript::AlreadyProcessed]),
    );
    let signed = build(rpc.clone()).await;
    let metrics = Arc::new(Metrics::new().unwrap());

    let outcome = RetryingSubmitter::new(rpc.clone(), SubmitOptions::default())
        .with_metrics(metrics.clone())
        .send(&signed, None)
        .await
        .unwrap();

    assert!(outcome.is_confirmed());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(metrics.already_processed.get(), 1);
    assert_eq!(metrics.submit_attempts.get(), 3);
}

#[tokio::test]
async fn test_commitment_forwarded_without_node_retry() {
    let rpc = Arc::new(MockLedgerRpc::new(Cluster::Devnet));
    let signed = build(rpc.clone()).await;
    let options = SubmitOptions {
        commitment: CommitmentConfig::finalized(),
        ..SubmitOptions::default()
    };

    RetryingSubmitter::new(rpc.clone(), options)
        .send(&signed, None)
        .await
        .unwrap();

    let sent = rpc.send_options();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].commitment, CommitmentConfig::finalized());
    assert!(!sent[0].network_retry);
}
