//! smart-tx
//!
//! Sends LAMPORTS_PER_SOL / 1000 from the fee payer to itself as a smart
//! transaction: priced from network fees, budgeted from simulation, then
//! submitted with bounded retries.

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::{native_token::LAMPORTS_PER_SOL, signature::Signer, system_instruction};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_transaction::{
    metrics::Metrics,
    observability::TraceContext,
    rpc::{Cluster, HeliusParams, HeliusRpc},
    submit::{RetryingSubmitter, SubmitOutcome},
    tx_builder::SmartTransactionBuilder,
    wallet::Wallet,
    Config,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the configured cluster
    #[arg(long, value_parser = parse_cluster)]
    cluster: Option<Cluster>,

    /// Helius API key
    #[arg(long, env = "HELIUS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base58 secret key of the fee payer
    #[arg(long, env = "SOLANA_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Keypair file, used when no private key is given
    #[arg(short, long)]
    keypair: Option<String>,

    /// Override the configured number of send attempts
    #[arg(long)]
    retries: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

fn parse_cluster(s: &str) -> Result<Cluster, String> {
    match s {
        "devnet" => Ok(Cluster::Devnet),
        "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
        other => Err(format!("unknown cluster '{}', expected devnet or mainnet", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    init_logging(args.verbose, args.json || config.monitoring.json_logs)?;

    if let Some(cluster) = args.cluster {
        config.rpc.cluster = cluster;
    }
    if let Some(key) = &args.api_key {
        config.rpc.api_key = Some(key.clone());
    }
    if let Some(retries) = args.retries {
        config.submit.retries = retries;
    }
    config.validate()?;

    let wallet = match (&args.private_key, &args.keypair) {
        (Some(secret), _) => Wallet::from_base58(secret)?,
        (None, Some(path)) => Wallet::from_file(path)?,
        (None, None) => anyhow::bail!("Set SOLANA_PRIVATE_KEY or pass --keypair"),
    };
    let params = config
        .helius_params()
        .context("Set HELIUS_API_KEY or rpc.endpoint")?;

    info!(
        cluster = %config.rpc.cluster,
        payer = %wallet.pubkey(),
        retries = config.submit.retries,
        "Starting smart transaction"
    );

    let rpc = Arc::new(
        HeliusRpc::new(config.rpc.cluster, params, config.rpc.commitment.into())
            .with_poll_interval(config.poll_interval()),
    );
    let metrics = Arc::new(Metrics::new()?);
    let builder = SmartTransactionBuilder::new(rpc.clone()).with_metrics(metrics.clone());
    let submitter =
        RetryingSubmitter::new(rpc, config.submit_options()).with_metrics(metrics.clone());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let payer = wallet.keypair();
    let transfer =
        system_instruction::transfer(&payer.pubkey(), &payer.pubkey(), LAMPORTS_PER_SOL / 1000);

    let trace = TraceContext::new("self_transfer");
    let signed = builder
        .build_traced(vec![transfer], payer, Some(&cancel), &trace)
        .await
        .context("Failed to build transaction")?;

    let outcome = submitter
        .send_traced(&signed, Some(&cancel), &trace.child_span("submit"))
        .await;

    match &outcome {
        Ok(SubmitOutcome::Confirmed { signature, attempts, .. }) => {
            info!(%signature, attempts, "Transaction confirmed");
        }
        Ok(SubmitOutcome::Exhausted { signature, attempts }) => {
            warn!(%signature, attempts, "Confirmation unknown after all attempts");
        }
        Err(e) => {
            error!(signature = %signed.signature(), error = %e, "Transaction failed");
        }
    }

    if config.monitoring.enable_metrics {
        println!("{}", metrics.export_text()?);
    }

    outcome?.require_confirmed()?;
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "smart_transaction=debug,smart_tx=debug,info"
    } else {
        "smart_transaction=info,smart_tx=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster() {
        assert_eq!(parse_cluster("devnet").unwrap(), Cluster::Devnet);
        assert_eq!(parse_cluster("mainnet-beta").unwrap(), Cluster::Mainnet);
        assert!(parse_cluster("testnet").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "smart-tx",
            "--cluster",
            "mainnet",
            "--keypair",
            "id.json",
            "--retries",
            "2",
        ])
        .unwrap();
        assert_eq!(args.cluster, Some(Cluster::Mainnet));
        assert_eq!(args.keypair.as_deref(), Some("id.json"));
        assert_eq!(args.retries, Some(2));
    }
}
