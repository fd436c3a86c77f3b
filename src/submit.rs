//! Bounded send-and-confirm loop
//!
//! Each attempt submits the signed bytes with node-side rebroadcast turned
//! off, then waits for confirmation. The pair runs under a per-attempt
//! timeout; a timeout spends one attempt and resends the same bytes.
//!
//! ```text
//! Pending -> Sent -> Confirmed
//!                 -> AlreadyProcessed   (counted as confirmed)
//!                 -> FatalError         (error returned)
//!                 -> TimedOut -> Sent   (attempts remain)
//!                             -> Exhausted
//! ```

use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{SmartTxError, SmartTxResult};
use crate::metrics::Metrics;
use crate::observability::TraceContext;
use crate::rpc::{cancellable, LedgerRpc, SendOptions};
use crate::tx_builder::SignedTransaction;

pub const DEFAULT_RETRIES: u32 = 4;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    /// Total attempts, the first send included
    pub retries: u32,
    pub commitment: CommitmentConfig,
    pub attempt_timeout: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            commitment: CommitmentConfig::confirmed(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Pending,
    Sent,
    TimedOut,
    Confirmed,
    AlreadyProcessed,
    FatalError,
    Exhausted,
}

impl SubmitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmitState::Confirmed
                | SubmitState::AlreadyProcessed
                | SubmitState::FatalError
                | SubmitState::Exhausted
        )
    }
}

/// Attempt bookkeeping owned by one `send` call
#[derive(Debug, Clone)]
pub struct RetryState {
    remaining: u32,
    made: u32,
    attempt_timeout: Duration,
    state: SubmitState,
}

impl RetryState {
    pub fn new(retries: u32, attempt_timeout: Duration) -> Self {
        Self {
            remaining: retries,
            made: 0,
            attempt_timeout,
            state: SubmitState::Pending,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn attempts_made(&self) -> u32 {
        self.made
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Start an attempt. Returns `false` once the budget is spent.
    fn begin_attempt(&mut self) -> bool {
        if self.remaining == 0 {
            self.state = SubmitState::Exhausted;
            return false;
        }
        self.remaining -= 1;
        self.made += 1;
        self.state = SubmitState::Sent;
        true
    }

    fn finish(&mut self, state: SubmitState) {
        self.state = state;
    }
}

/// How a submission ended, short of a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Reached the requested commitment. `already_processed` is set when a
    /// resend was rejected because an earlier send had already landed.
    Confirmed {
        signature: Signature,
        attempts: u32,
        already_processed: bool,
    },
    /// Every attempt timed out. The transaction may still land before its
    /// blockhash expires.
    Exhausted { signature: Signature, attempts: u32 },
}

impl SubmitOutcome {
    pub fn signature(&self) -> Signature {
        match self {
            SubmitOutcome::Confirmed { signature, .. } | SubmitOutcome::Exhausted { signature, .. } => {
                *signature
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SubmitOutcome::Confirmed { attempts, .. } | SubmitOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmitOutcome::Confirmed { .. })
    }

    /// Signature of a confirmed transaction, or `Indeterminate` on exhaustion
    pub fn require_confirmed(self) -> SmartTxResult<Signature> {
        match self {
            SubmitOutcome::Confirmed { signature, .. } => Ok(signature),
            SubmitOutcome::Exhausted { attempts, .. } => {
                Err(SmartTxError::Indeterminate { attempts })
            }
        }
    }
}

pub struct RetryingSubmitter {
    rpc: Arc<dyn LedgerRpc>,
    options: SubmitOptions,
    metrics: Option<Arc<Metrics>>,
}

impl RetryingSubmitter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, options: SubmitOptions) -> Self {
        Self {
            rpc,
            options,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn options(&self) -> &SubmitOptions {
        &self.options
    }

    pub async fn send(
        &self,
        signed: &SignedTransaction,
        cancel: Option<&CancellationToken>,
    ) -> SmartTxResult<SubmitOutcome> {
        self.send_traced(signed, cancel, &TraceContext::new("submit_smart_transaction"))
            .await
    }

    /// Send and confirm, resending identical bytes after each timeout
    pub async fn send_traced(
        &self,
        signed: &SignedTransaction,
        cancel: Option<&CancellationToken>,
        trace: &TraceContext,
    ) -> SmartTxResult<SubmitOutcome> {
        if self.options.retries == 0 {
            return Err(SmartTxError::Configuration(
                "submit retries must be at least 1".to_string(),
            ));
        }

        let signature = signed.signature();
        let mut retry = RetryState::new(self.options.retries, self.options.attempt_timeout);

        while retry.begin_attempt() {
            let attempt = retry.attempts_made();
            self.inc(|m| m.submit_attempts.inc());
            debug!(
                trace_id = %trace.trace_id(),
                span_id = %trace.span_id(),
                parent_span_id = ?trace.parent_span_id(),
                %signature,
                attempt,
                remaining = retry.remaining(),
                "Sending transaction"
            );

            let result = tokio::time::timeout(
                retry.attempt_timeout(),
                cancellable(cancel, self.send_and_confirm(signed)),
            )
            .await;

            match result {
                Ok(Ok(())) => {
                    retry.finish(SubmitState::Confirmed);
                    self.inc(|m| m.confirmations.inc());
                    info!(
                        trace_id = %trace.trace_id(),
                        span_id = %trace.span_id(),
                        parent_span_id = ?trace.parent_span_id(),
                        %signature,
                        attempts = attempt,
                        "Transaction confirmed"
                    );
                    return Ok(SubmitOutcome::Confirmed {
                        signature,
                        attempts: attempt,
                        already_processed: false,
                    });
                }
                Ok(Err(SmartTxError::AlreadyProcessed)) => {
                    retry.finish(SubmitState::AlreadyProcessed);
                    self.inc(|m| {
                        m.already_processed.inc();
                        m.confirmations.inc();
                    });
                    info!(
                        trace_id = %trace.trace_id(),
                        span_id = %trace.span_id(),
                        parent_span_id = ?trace.parent_span_id(),
                        %signature,
                        attempts = attempt,
                        "Transaction already processed by an earlier send"
                    );
                    return Ok(SubmitOutcome::Confirmed {
                        signature,
                        attempts: attempt,
                        already_processed: true,
                    });
                }
                Ok(Err(SmartTxError::Cancelled)) => {
                    retry.finish(SubmitState::FatalError);
                    debug!(
                        trace_id = %trace.trace_id(),
                        span_id = %trace.span_id(),
                        %signature,
                        attempt,
                        "Submission cancelled"
                    );
                    return Err(SmartTxError::Cancelled);
                }
                Ok(Err(e)) => {
                    retry.finish(SubmitState::FatalError);
                    self.inc(|m| m.fatal_errors.inc());
                    warn!(
                        trace_id = %trace.trace_id(),
                        span_id = %trace.span_id(),
                        parent_span_id = ?trace.parent_span_id(),
                        %signature,
                        attempt,
                        error = %e,
                        category = e.category(),
                        "Submission failed"
                    );
                    return Err(e);
                }
                Err(_elapsed) => {
                    retry.finish(SubmitState::TimedOut);
                    debug!(
                        trace_id = %trace.trace_id(),
                        span_id = %trace.span_id(),
                        parent_span_id = ?trace.parent_span_id(),
                        %signature,
                        attempt,
                        timeout_ms = retry.attempt_timeout().as_millis() as u64,
                        "Confirmation timed out, retrying"
                    );
                }
            }
        }

        self.inc(|m| m.exhausted.inc());
        warn!(
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            parent_span_id = ?trace.parent_span_id(),
            %signature,
            attempts = retry.attempts_made(),
            "Retries exhausted without confirmation"
        );
        Ok(SubmitOutcome::Exhausted {
            signature,
            attempts: retry.attempts_made(),
        })
    }

    async fn send_and_confirm(&self, signed: &SignedTransaction) -> SmartTxResult<()> {
        let send_options = SendOptions {
            commitment: self.options.commitment,
            network_retry: false,
        };
        let handle = self.rpc.submit(signed, send_options).await?;
        self.rpc
            .await_confirmation(&handle, self.options.commitment)
            .await
    }

    fn inc(&self, f: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}
