use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use etomic_core::{EscrowError, SwapId};

use crate::engine::{ApprovalSink, SignalSource};
use crate::error::RelayError;
use crate::oracle::{ForeignLedger, Lookup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Outcome of a single pass over the pending signals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Deals approved by this pass.
    pub approved: Vec<SwapId>,
    /// Signals whose foreign transaction is not (yet) known.
    pub not_found: usize,
    /// Deals that reached a terminal status before the approval landed.
    pub settled: usize,
    /// Deals past their claim deadline.
    pub skipped: usize,
    /// Lookups or approvals that failed and will be retried.
    pub failures: usize,
}

impl PollReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

pub struct Relay {
    oracle: Arc<dyn ForeignLedger>,
    source: Arc<dyn SignalSource>,
    sink: Arc<dyn ApprovalSink>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(
        oracle: Arc<dyn ForeignLedger>,
        source: Arc<dyn SignalSource>,
        sink: Arc<dyn ApprovalSink>,
        config: RelayConfig,
    ) -> Self {
        Self {
            oracle,
            source,
            sink,
            config,
        }
    }

    /// Look up every pending signal on the foreign ledger and approve the
    /// deals whose transaction exists. Lookups are never cached between
    /// passes.
    pub async fn poll_once(&self) -> Result<PollReport, RelayError> {
        let signals = self.source.pending_approvals().await?;
        let mut report = PollReport::default();
        if signals.is_empty() {
            return Ok(report);
        }
        tracing::debug!(pending = signals.len(), "checking approval signals");

        for signal in signals {
            let id = signal.id;
            match self.oracle.lookup_transaction(&signal.foreign_tx).await {
                Ok(Lookup::Found) => {}
                Ok(Lookup::NotFound) => {
                    tracing::debug!(swap_id = %id, foreign_tx = %signal.foreign_tx, "foreign transaction not found");
                    report.not_found += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(swap_id = %id, foreign_tx = %signal.foreign_tx, error = %e, "foreign ledger lookup failed");
                    report.failures += 1;
                    continue;
                }
            }

            match self.sink.approve(id).await {
                Ok(()) => {
                    tracing::info!(swap_id = %id, foreign_tx = %signal.foreign_tx, "relay deal approved");
                    report.approved.push(id);
                }
                Err(RelayError::Rejected(e)) if e.is_status_conflict() => {
                    tracing::debug!(swap_id = %id, error = %e, "deal already settled");
                    report.settled += 1;
                }
                Err(RelayError::Rejected(e @ EscrowError::Expired { .. })) => {
                    tracing::warn!(swap_id = %id, error = %e, "claim deadline passed before approval");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(swap_id = %id, error = %e, "approval failed");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Poll until `shutdown` flips to `true`. A pass with failures doubles
    /// the wait before the next one, up to `max_backoff`; a clean pass
    /// resets it to `poll_interval`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_backoff_ms = self.config.max_backoff.as_millis() as u64,
            "relay started"
        );
        let mut delay = self.config.poll_interval;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let clean = match self.poll_once().await {
                Ok(report) => {
                    if !report.approved.is_empty() || report.failures > 0 {
                        tracing::info!(
                            approved = report.approved.len(),
                            not_found = report.not_found,
                            settled = report.settled,
                            skipped = report.skipped,
                            failures = report.failures,
                            "relay poll finished"
                        );
                    }
                    report.is_clean()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "relay poll failed");
                    false
                }
            };
            delay = next_delay(delay, clean, &self.config);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("relay stopped");
    }
}

fn next_delay(current: Duration, clean: bool, config: &RelayConfig) -> Duration {
    if clean {
        return config.poll_interval;
    }
    current
        .saturating_mul(2)
        .min(config.max_backoff)
        .max(config.poll_interval)
}
