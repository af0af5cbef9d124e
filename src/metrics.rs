//! Controller metrics
//!
//! Prometheus counters for watch traffic, applies, reconciliation passes
//! and status writes, held in a dedicated registry served on `/metrics`.

use crate::domain::ResourceKind;
use prometheus::{IntCounterVec, Opts, Registry};

/// Counters shared by every controller task
#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    watch_events: IntCounterVec,
    watch_reconnects: IntCounterVec,
    applies: IntCounterVec,
    reconcile_passes: IntCounterVec,
    status_conflicts: IntCounterVec,
}

impl std::fmt::Debug for ControllerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerMetrics").finish_non_exhaustive()
    }
}

impl ControllerMetrics {
    /// Create and register all counters
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("pinot_operator".to_string()), None)?;

        let watch_events = IntCounterVec::new(
            Opts::new("watch_events_total", "Watch events received"),
            &["kind", "event"],
        )?;
        let watch_reconnects = IntCounterVec::new(
            Opts::new("watch_reconnects_total", "Watch sessions reopened"),
            &["kind"],
        )?;
        let applies = IntCounterVec::new(
            Opts::new("applies_total", "Apply attempts by outcome"),
            &["kind", "outcome"],
        )?;
        let reconcile_passes = IntCounterVec::new(
            Opts::new("reconcile_passes_total", "Completed reconciliation passes"),
            &["kind"],
        )?;
        let status_conflicts = IntCounterVec::new(
            Opts::new("status_conflicts_total", "Status writes dropped on conflict"),
            &["kind"],
        )?;

        registry.register(Box::new(watch_events.clone()))?;
        registry.register(Box::new(watch_reconnects.clone()))?;
        registry.register(Box::new(applies.clone()))?;
        registry.register(Box::new(reconcile_passes.clone()))?;
        registry.register(Box::new(status_conflicts.clone()))?;

        Ok(Self {
            registry,
            watch_events,
            watch_reconnects,
            applies,
            reconcile_passes,
            status_conflicts,
        })
    }

    pub fn watch_event(&self, kind: ResourceKind, event: &str) {
        self.watch_events
            .with_label_values(&[kind.plural(), event])
            .inc();
    }

    pub fn watch_reconnect(&self, kind: ResourceKind) {
        self.watch_reconnects.with_label_values(&[kind.plural()]).inc();
    }

    pub fn apply(&self, kind: ResourceKind, outcome: &str) {
        self.applies.with_label_values(&[kind.plural(), outcome]).inc();
    }

    pub fn reconcile_pass(&self, kind: ResourceKind) {
        self.reconcile_passes
            .with_label_values(&[kind.plural()])
            .inc();
    }

    pub fn status_conflict(&self, kind: ResourceKind) {
        self.status_conflicts
            .with_label_values(&[kind.plural()])
            .inc();
    }

    /// Count of apply attempts for a kind and outcome
    pub fn applies_count(&self, kind: ResourceKind, outcome: &str) -> u64 {
        self.applies.with_label_values(&[kind.plural(), outcome]).get()
    }

    /// Encode every counter in the text exposition format
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        use prometheus::{Encoder, TextEncoder};

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_encoded() {
        let metrics = ControllerMetrics::new().unwrap();
        metrics.watch_event(ResourceKind::Cluster, "added");
        metrics.apply(ResourceKind::Table, "ready");
        metrics.apply(ResourceKind::Table, "ready");

        assert_eq!(metrics.applies_count(ResourceKind::Table, "ready"), 2);

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("pinot_operator_watch_events_total"));
        assert!(text.contains("kind=\"clusters\""));
    }
}
