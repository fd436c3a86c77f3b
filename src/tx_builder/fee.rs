//! Priority fee estimation
//!
//! Two strategies, picked from the client's cluster:
//! - `HistoricalMedian`: lower median of recent non-zero per-slot fees
//! - `ServiceEstimate`: the provider's recommended fee
//!
//! Neither retries; RPC errors surface unchanged.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::draft::DraftMessage;
use super::instructions::writable_accounts;
use crate::errors::SmartTxResult;
use crate::rpc::{cancellable, Cluster, LedgerRpc};

/// Returned when no recent slot paid a non-zero fee
pub const DEFAULT_PRIORITY_FEE: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeStrategy {
    HistoricalMedian,
    ServiceEstimate,
}

impl FeeStrategy {
    pub fn for_cluster(cluster: Cluster) -> Self {
        match cluster {
            Cluster::Devnet => FeeStrategy::HistoricalMedian,
            Cluster::Mainnet => FeeStrategy::ServiceEstimate,
        }
    }
}

/// Lower median of the non-zero samples
///
/// A zero sample means the slot saw no contention on these accounts, not
/// that inclusion is free, so zeros are dropped before ranking.
pub fn lower_median_nonzero(samples: &[u64]) -> u64 {
    let mut fees: Vec<u64> = samples.iter().copied().filter(|fee| *fee > 0).collect();
    if fees.is_empty() {
        return DEFAULT_PRIORITY_FEE;
    }
    fees.sort_unstable();
    fees[fees.len() / 2]
}

#[derive(Debug, Clone, Copy)]
pub struct FeeEstimator {
    strategy: FeeStrategy,
}

impl FeeEstimator {
    pub fn new(strategy: FeeStrategy) -> Self {
        Self { strategy }
    }

    pub fn for_cluster(cluster: Cluster) -> Self {
        Self::new(FeeStrategy::for_cluster(cluster))
    }

    pub fn strategy(&self) -> FeeStrategy {
        self.strategy
    }

    /// Micro-lamports per compute unit for `draft`
    pub async fn estimate(
        &self,
        rpc: &dyn LedgerRpc,
        draft: &DraftMessage,
        cancel: Option<&CancellationToken>,
    ) -> SmartTxResult<u64> {
        let accounts: Vec<_> = writable_accounts(draft.instructions()).into_iter().collect();

        let fee = match self.strategy {
            FeeStrategy::HistoricalMedian => {
                let samples =
                    cancellable(cancel, rpc.get_recent_priority_fees(&accounts)).await?;
                let fee = lower_median_nonzero(&samples);
                debug!(
                    samples = samples.len(),
                    fee,
                    "Priority fee from recent prioritization fees"
                );
                fee
            }
            FeeStrategy::ServiceEstimate => {
                let fee = cancellable(cancel, rpc.get_recommended_priority_fee(&accounts)).await?;
                debug!(fee, "Priority fee from recommendation service");
                fee
            }
        };

        Ok(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_median_discards_zeros() {
        assert_eq!(lower_median_nonzero(&[5, 0, 10, 3, 0]), 5);
    }

    #[test]
    fn test_median_index_is_half_length() {
        // floor(4 / 2) = 2 on [1, 2, 7, 9]
        assert_eq!(lower_median_nonzero(&[9, 1, 7, 2]), 7);
    }

    #[test]
    fn test_lower_median_empty_and_all_zero() {
        assert_eq!(lower_median_nonzero(&[]), DEFAULT_PRIORITY_FEE);
        assert_eq!(lower_median_nonzero(&[0, 0, 0]), DEFAULT_PRIORITY_FEE);
    }

    #[test]
    fn test_strategy_for_cluster() {
        assert_eq!(FeeStrategy::for_cluster(Cluster::Devnet), FeeStrategy::HistoricalMedian);
        assert_eq!(FeeStrategy::for_cluster(Cluster::Mainnet), FeeStrategy::ServiceEstimate);
    }
}
