//! Prometheus metrics for the build and submit pipeline

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    // Build
    pub builds_total: IntCounter,
    pub build_failures: IntCounter,
    pub build_latency: Histogram,
    pub priority_fee: Histogram,

    // Submit
    pub submit_attempts: IntCounter,
    pub confirmations: IntCounter,
    pub already_processed: IntCounter,
    pub exhausted: IntCounter,
    pub fatal_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let builds_total = IntCounter::with_opts(Opts::new(
            "smart_tx_builds_total",
            "Transactions assembled and signed",
        ))?;
        let build_failures = IntCounter::with_opts(Opts::new(
            "smart_tx_build_failures_total",
            "Builds aborted by an anchor, estimation or signing error",
        ))?;
        let build_latency = Histogram::with_opts(
            HistogramOpts::new("smart_tx_build_latency_seconds", "End-to-end build latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        let priority_fee = Histogram::with_opts(
            HistogramOpts::new(
                "smart_tx_priority_fee_micro_lamports",
                "Priority fee attached to built transactions",
            )
            .buckets(prometheus::exponential_buckets(1.0, 10.0, 8)?),
        )?;

        let submit_attempts = IntCounter::with_opts(Opts::new(
            "smart_tx_submit_attempts_total",
            "Send-and-confirm attempts",
        ))?;
        let confirmations = IntCounter::with_opts(Opts::new(
            "smart_tx_confirmations_total",
            "Transactions confirmed at the requested commitment",
        ))?;
        let already_processed = IntCounter::with_opts(Opts::new(
            "smart_tx_already_processed_total",
            "Retries that found the transaction already processed",
        ))?;
        let exhausted = IntCounter::with_opts(Opts::new(
            "smart_tx_exhausted_total",
            "Submissions that ran out of attempts with unknown outcome",
        ))?;
        let fatal_errors = IntCounter::with_opts(Opts::new(
            "smart_tx_fatal_errors_total",
            "Submissions ended by a non-retryable error",
        ))?;

        registry.register(Box::new(builds_total.clone()))?;
        registry.register(Box::new(build_failures.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(priority_fee.clone()))?;
        registry.register(Box::new(submit_attempts.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(already_processed.clone()))?;
        registry.register(Box::new(exhausted.clone()))?;
        registry.register(Box::new(fatal_errors.clone()))?;

        Ok(Self {
            registry,
            builds_total,
            build_failures,
            build_latency,
            priority_fee,
            submit_attempts,
            confirmations,
            already_processed,
            exhausted,
            fatal_errors,
        })
    }

    /// Prometheus text exposition of every registered metric
    pub fn export_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
