//! Helius-backed `LedgerRpc`
//!
//! Standard methods go through the nonblocking `solana_client` RpcClient.
//! `getPriorityFeeEstimate` is a Helius extension the RpcClient does not
//! know about, so mainnet clients post it directly with `reqwest`.

use async_trait::async_trait;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, transaction::VersionedTransaction,
};
use solana_transaction_status::UiTransactionEncoding;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::decode::{
    decode_priority_fee_estimate, JsonRpcRequest, PriorityFeeEstimateParams,
    GET_PRIORITY_FEE_ESTIMATE,
};
use super::{Cluster, LedgerRpc, LifetimeAnchor, SendOptions, SubmissionHandle};
use crate::errors::{SmartTxError, SmartTxResult};
use crate::tx_builder::SignedTransaction;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Block height is checked once every this many status polls
const BLOCK_HEIGHT_CHECK_EVERY: u32 = 5;

/// How to reach a Helius node
#[derive(Debug, Clone)]
pub enum HeliusParams {
    ApiKey(String),
    Endpoint(String),
}

impl HeliusParams {
    pub fn http_endpoint(&self, cluster: Cluster) -> String {
        match self {
            HeliusParams::ApiKey(key) => {
                format!("https://{}.helius-rpc.com/?api-key={}", cluster, key)
            }
            HeliusParams::Endpoint(url) => url.clone(),
        }
    }
}

/// RPC client tagged with the cluster it targets
#[derive(Clone)]
pub struct HeliusRpc {
    cluster: Cluster,
    endpoint: String,
    rpc: Arc<RpcClient>,
    http: reqwest::Client,
    poll_interval: Duration,
}

impl std::fmt::Debug for HeliusRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Endpoint may embed an API key
        f.debug_struct("HeliusRpc")
            .field("cluster", &self.cluster)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl HeliusRpc {
    pub fn new(cluster: Cluster, params: HeliusParams, commitment: CommitmentConfig) -> Self {
        let endpoint = params.http_endpoint(cluster);
        Self {
            cluster,
            rpc: Arc::new(RpcClient::new_with_commitment(endpoint.clone(), commitment)),
            endpoint,
            http: reqwest::Client::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn devnet(params: HeliusParams) -> Self {
        Self::new(Cluster::Devnet, params, CommitmentConfig::confirmed())
    }

    pub fn mainnet(params: HeliusParams) -> Self {
        Self::new(Cluster::Mainnet, params, CommitmentConfig::confirmed())
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn rpc_client(&self) -> &RpcClient {
        &self.rpc
    }

    async fn current_block_height(&self) -> SmartTxResult<u64> {
        self.rpc
            .get_block_height()
            .await
            .map_err(|e| SmartTxError::from_client_error(e, "getBlockHeight"))
    }
}

#[async_trait]
impl LedgerRpc for HeliusRpc {
    fn cluster(&self) -> Cluster {
        self.cluster
    }

    async fn get_latest_anchor(&self) -> SmartTxResult<LifetimeAnchor> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.rpc.commitment())
            .await
            .map_err(|e| SmartTxError::from_client_error(e, "getLatestBlockhash"))?;
        Ok(LifetimeAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_recent_priority_fees(&self, accounts: &[Pubkey]) -> SmartTxResult<Vec<u64>> {
        let fees = self
            .rpc
            .get_recent_prioritization_fees(accounts)
            .await
            .map_err(|e| SmartTxError::from_client_error(e, "getRecentPrioritizationFees"))?;
        Ok(fees.into_iter().map(|f| f.prioritization_fee).collect())
    }

    async fn get_recommended_priority_fee(&self, accounts: &[Pubkey]) -> SmartTxResult<u64> {
        if self.cluster != Cluster::Mainnet {
            return Err(SmartTxError::unsupported(
                self.cluster.as_str(),
                GET_PRIORITY_FEE_ESTIMATE,
            ));
        }

        let params = PriorityFeeEstimateParams::recommended(
            accounts.iter().map(|a| a.to_string()).collect(),
        );
        let request = JsonRpcRequest::new(GET_PRIORITY_FEE_ESTIMATE, [params]);

        let body = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| SmartTxError::FeeEstimation(format!("{}: {}", GET_PRIORITY_FEE_ESTIMATE, e)))?
            .bytes()
            .await
            .map_err(|e| SmartTxError::FeeEstimation(format!("{}: {}", GET_PRIORITY_FEE_ESTIMATE, e)))?;

        decode_priority_fee_estimate(&body)
    }

    async fn simulate_compute_units(&self, tx: &VersionedTransaction) -> SmartTxResult<u64> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.rpc.commitment()),
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .rpc
            .simulate_transaction_with_config(tx, config)
            .await
            .map_err(|e| SmartTxError::from_client_error(e, "simulateTransaction"))?;

        if let Some(err) = response.value.err {
            return Err(SmartTxError::simulation_failed(format!(
                "{:?} (logs: {:?})",
                err,
                response.value.logs.unwrap_or_default()
            )));
        }
        response
            .value
            .units_consumed
            .ok_or_else(|| SmartTxError::simulation_failed("node did not report unitsConsumed"))
    }

    async fn submit(
        &self,
        tx: &SignedTransaction,
        options: SendOptions,
    ) -> SmartTxResult<SubmissionHandle> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(options.commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: if options.network_retry { None } else { Some(0) },
            ..RpcSendTransactionConfig::default()
        };
        let signature = self
            .rpc
            .send_transaction_with_config(tx.transaction(), config)
            .await
            .map_err(|e| SmartTxError::from_client_error(e, "sendTransaction"))?;
        Ok(SubmissionHandle {
            signature,
            last_valid_block_height: tx.anchor().last_valid_block_height,
        })
    }

    async fn await_confirmation(
        &self,
        handle: &SubmissionHandle,
        commitment: CommitmentConfig,
    ) -> SmartTxResult<()> {
        let mut polls: u32 = 0;
        loop {
            let statuses = self
                .rpc
                .get_signature_statuses(&[handle.signature])
                .await
                .map_err(|e| SmartTxError::from_client_error(e, "getSignatureStatuses"))?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(SmartTxError::TransactionFailed(format!("{:?}", err)));
                }
                if status.satisfies_commitment(commitment) {
                    debug!(signature = %handle.signature, "Signature reached commitment");
                    return Ok(());
                }
            }

            if polls % BLOCK_HEIGHT_CHECK_EVERY == 0 {
                let block_height = self.current_block_height().await?;
                if handle.is_expired(block_height) {
                    return Err(SmartTxError::Expired {
                        block_height,
                        last_valid_block_height: handle.last_valid_block_height,
                    });
                }
            }
            polls = polls.wrapping_add(1);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
