//! Configuration module
//!
//! Loads the TOML configuration for the client, the builder and the
//! submitter. Secrets (API key, signing key) are not read here; the binary
//! takes them from the environment or the command line.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::time::Duration;

use crate::errors::{SmartTxError, SmartTxResult};
use crate::rpc::{Cluster, HeliusParams};
use crate::submit::SubmitOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub submit: SubmitConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentSetting {
    Processed,
    Confirmed,
    Finalized,
}

impl From<CommitmentSetting> for CommitmentConfig {
    fn from(setting: CommitmentSetting) -> Self {
        match setting {
            CommitmentSetting::Processed => CommitmentConfig::processed(),
            CommitmentSetting::Confirmed => CommitmentConfig::confirmed(),
            CommitmentSetting::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Network the client targets; selects the fee strategy
    #[serde(default = "default_cluster")]
    pub cluster: Cluster,

    /// Full endpoint URL. Takes precedence over `api_key`.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Commitment for blockhash and simulation reads
    #[serde(default = "default_commitment")]
    pub commitment: CommitmentSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Total send attempts
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Commitment the submitter waits for
    #[serde(default = "default_commitment")]
    pub commitment: CommitmentSetting,

    /// Signature status polling interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Dump Prometheus text metrics after a run
    #[serde(default)]
    pub enable_metrics: bool,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_cluster() -> Cluster { Cluster::Devnet }
fn default_commitment() -> CommitmentSetting { CommitmentSetting::Confirmed }
fn default_retries() -> u32 { 4 }
fn default_attempt_timeout_secs() -> u64 { 15 }
fn default_poll_interval_ms() -> u64 { 400 }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            endpoint: None,
            api_key: None,
            commitment: default_commitment(),
        }
    }
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            commitment: default_commitment(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SmartTxResult<()> {
        if self.submit.retries == 0 {
            return Err(SmartTxError::Configuration(
                "submit.retries must be at least 1".to_string(),
            ));
        }
        if self.submit.attempt_timeout_secs == 0 {
            return Err(SmartTxError::Configuration(
                "submit.attempt_timeout_secs must be positive".to_string(),
            ));
        }
        if self.submit.poll_interval_ms == 0 {
            return Err(SmartTxError::Configuration(
                "submit.poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(endpoint) = &self.rpc.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(SmartTxError::Configuration(format!(
                    "rpc.endpoint must be an http(s) URL, got {}",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// How to reach the node; `None` when neither endpoint nor key is set
    pub fn helius_params(&self) -> Option<HeliusParams> {
        match (&self.rpc.endpoint, &self.rpc.api_key) {
            (Some(url), _) => Some(HeliusParams::Endpoint(url.clone())),
            (None, Some(key)) => Some(HeliusParams::ApiKey(key.clone())),
            (None, None) => None,
        }
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            retries: self.submit.retries,
            commitment: self.submit.commitment.into(),
            attempt_timeout: Duration::from_secs(self.submit.attempt_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.submit.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rpc.cluster, Cluster::Devnet);
        assert_eq!(config.submit.retries, 4);
        assert_eq!(config.submit_options().attempt_timeout, Duration::from_secs(15));
        assert_eq!(config.poll_interval(), Duration::from_millis(400));
        assert!(config.helius_params().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
cluster = "mainnet"
api_key = "abc"

[submit]
retries = 6
commitment = "finalized"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.cluster, Cluster::Mainnet);
        assert_eq!(config.submit.retries, 6);
        assert_eq!(config.submit.attempt_timeout_secs, 15);
        assert_eq!(
            config.submit_options().commitment,
            CommitmentConfig::finalized()
        );
        assert!(matches!(config.helius_params(), Some(HeliusParams::ApiKey(k)) if k == "abc"));
        assert!(!config.monitoring.json_logs);
    }

    #[test]
    fn test_endpoint_overrides_api_key() {
        let mut config = Config::default();
        config.rpc.api_key = Some("abc".into());
        config.rpc.endpoint = Some("http://localhost:8899".into());
        assert!(matches!(
            config.helius_params(),
            Some(HeliusParams::Endpoint(url)) if url == "http://localhost:8899"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[submit]\nretries = 0").unwrap();
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.rpc.endpoint = Some("localhost:8899".into());
        assert!(matches!(
            config.validate(),
            Err(SmartTxError::Configuration(_))
        ));
    }
}
