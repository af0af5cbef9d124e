//! Reconciliation Scheduler
//!
//! Re-validates every registered resource of one kind on a fixed interval,
//! independent of watch traffic. A pass iterates a point-in-time snapshot
//! of the registry; passes for a kind never overlap. Keys held by in-flight
//! watch work, or deleted since the snapshot was taken, are skipped for that
//! pass. Each pass first retries teardowns that previously failed.

use crate::controller::dispatcher::{Dispatcher, ReconcileAttempt};
use crate::domain::ManagedResource;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Totals for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub ready: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Pending teardowns completed at the start of the pass
    pub teardowns_retried: usize,
}

/// Periodic reconciler for one kind
pub struct ReconciliationScheduler<K: ManagedResource> {
    dispatcher: Arc<Dispatcher<K>>,
    interval: Duration,
}

impl<K: ManagedResource> ReconciliationScheduler<K> {
    pub fn new(dispatcher: Arc<Dispatcher<K>>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
        }
    }

    /// Run passes until shutdown; the first pass starts one interval in
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(kind = %K::KIND, interval = ?self.interval, "Starting reconciliation scheduler");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
            }
        }

        info!(kind = %K::KIND, "Reconciliation scheduler stopped");
    }

    /// Retry pending teardowns, then reconcile every entry of the current
    /// registry snapshot
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport {
            teardowns_retried: self.dispatcher.retry_teardowns().await,
            ..Default::default()
        };
        let snapshot = self.dispatcher.registry().snapshot();

        for resource in &snapshot {
            match self.dispatcher.reconcile(resource).await {
                ReconcileAttempt::Done(outcome) if outcome.is_ready() => report.ready += 1,
                ReconcileAttempt::Done(_) => report.failed += 1,
                ReconcileAttempt::Busy | ReconcileAttempt::Gone => report.skipped += 1,
            }
        }

        self.dispatcher.metrics().reconcile_pass(K::KIND);
        debug!(
            kind = %K::KIND,
            ready = report.ready,
            failed = report.failed,
            skipped = report.skipped,
            teardowns_retried = report.teardowns_retried,
            "Reconciliation pass complete"
        );
        report
    }
}
