//! Network client seam
//!
//! `LedgerRpc` is the fixed, typed method set the pipeline needs from a
//! Solana node. The concrete `HeliusRpc` wraps the nonblocking
//! `solana_client` RpcClient and adds the provider-specific priority fee
//! method; tests use `MockLedgerRpc`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::errors::{SmartTxError, SmartTxResult};
use crate::tx_builder::SignedTransaction;

pub mod decode;
pub mod helius;

pub use helius::{HeliusParams, HeliusRpc};

/// Which network variant a client targets
///
/// Chosen when the client is constructed and carried alongside it; the fee
/// estimator dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Mainnet,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Mainnet => "mainnet",
        }
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recent blockhash plus the last block height at which it is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Options for a single submission
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// Commitment used for the preflight check
    pub commitment: CommitmentConfig,
    /// Ask the node to rebroadcast on its own. Always `false` from the submitter.
    pub network_retry: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::confirmed(),
            network_retry: false,
        }
    }
}

/// Returned by `LedgerRpc::submit`, consumed by `await_confirmation`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub signature: Signature,
    pub last_valid_block_height: u64,
}

impl SubmissionHandle {
    /// True once the chain has passed the blockhash's last valid height
    pub fn is_expired(&self, current_block_height: u64) -> bool {
        current_block_height > self.last_valid_block_height
    }
}

/// Capabilities required from the network client
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Network variant this client was built for
    fn cluster(&self) -> Cluster;

    async fn get_latest_anchor(&self) -> SmartTxResult<LifetimeAnchor>;

    /// Per-slot prioritization fees recently paid for the given writable accounts
    async fn get_recent_priority_fees(&self, accounts: &[Pubkey]) -> SmartTxResult<Vec<u64>>;

    /// Provider recommendation for the given accounts. Mainnet only.
    async fn get_recommended_priority_fee(&self, accounts: &[Pubkey]) -> SmartTxResult<u64>;

    /// Units consumed when simulating an unsigned transaction
    async fn simulate_compute_units(&self, tx: &VersionedTransaction) -> SmartTxResult<u64>;

    async fn submit(
        &self,
        tx: &SignedTransaction,
        options: SendOptions,
    ) -> SmartTxResult<SubmissionHandle>;

    /// Resolves once the signature reaches `commitment`
    async fn await_confirmation(
        &self,
        handle: &SubmissionHandle,
        commitment: CommitmentConfig,
    ) -> SmartTxResult<()>;
}

/// Race `fut` against an optional cancellation token
///
/// Dropping the losing future aborts the in-flight request.
pub async fn cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> SmartTxResult<T>
where
    F: Future<Output = SmartTxResult<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(SmartTxError::Cancelled),
            res = fut => res,
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_passes_through_without_token() {
        let res = cancellable(None, async { Ok::<_, SmartTxError>(7u64) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_future() {
        let token = CancellationToken::new();
        token.cancel();
        let res: SmartTxResult<()> =
            cancellable(Some(&token), futures::future::pending()).await;
        assert!(matches!(res, Err(SmartTxError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_fires_mid_flight() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            child.cancel();
        });
        let res: SmartTxResult<()> = cancellable(Some(&token), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(SmartTxError::Cancelled)));
    }

    #[test]
    fn test_handle_expiry_boundary() {
        let handle = SubmissionHandle {
            signature: Signature::default(),
            last_valid_block_height: 150,
        };
        assert!(!handle.is_expired(150));
        assert!(handle.is_expired(151));
    }

    #[test]
    fn test_cluster_serde_lowercase() {
        let c: Cluster = serde_json::from_str("\"mainnet\"").unwrap();
        assert_eq!(c, Cluster::Mainnet);
        assert_eq!(Cluster::Devnet.to_string(), "devnet");
    }
}
