//! Status Reporter
//!
//! Builds a fresh status snapshot from an apply outcome and writes it as a
//! full replace. A version conflict drops the write with a warning; the
//! next reconciliation pass supersedes it.

use crate::controller::handlers::ApplyOutcome;
use crate::crd::StatusSnapshot;
use crate::domain::{ManagedResource, ResourceKind, StatusSinkRef, StatusTarget};
use crate::error::{ErrorAction, Result};
use crate::metrics::ControllerMetrics;
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, warn};

/// Writes normalized status snapshots back to resources
pub struct StatusReporter {
    sink: StatusSinkRef,
    metrics: ControllerMetrics,
}

impl StatusReporter {
    pub fn new(sink: StatusSinkRef, metrics: ControllerMetrics) -> Self {
        Self { sink, metrics }
    }

    /// Build a snapshot stamped with the current time
    pub fn snapshot(kind: ResourceKind, outcome: &ApplyOutcome) -> StatusSnapshot {
        StatusSnapshot {
            r#type: kind.status_tag().to_string(),
            status: outcome.phase,
            reason: outcome.reason.clone(),
            message: outcome.message.clone(),
            last_update_time: Some(Utc::now()),
            reload_status: outcome.reload_status.clone(),
        }
    }

    /// Persist the outcome as the resource's status
    ///
    /// Conflicts are swallowed; other write errors are returned.
    pub async fn report<K: ManagedResource>(&self, resource: &K, outcome: &ApplyOutcome) -> Result<()> {
        let target = StatusTarget {
            kind: K::KIND,
            key: resource.key(),
            resource_version: resource.resource_version(),
        };
        let snapshot = Self::snapshot(K::KIND, outcome);

        match self.sink.replace_status(&target, &snapshot).await {
            Ok(()) => {
                debug!(
                    kind = %K::KIND,
                    key = %target.key,
                    status = %snapshot.status,
                    reason = %snapshot.reason,
                    "Status updated"
                );
                Ok(())
            }
            Err(e) if e.action() == ErrorAction::Drop => {
                warn!(
                    kind = %K::KIND,
                    key = %target.key,
                    "Status write conflict, dropping update"
                );
                self.metrics.status_conflict(K::KIND);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::handlers::REASON_CONFIGURATION_ERROR;
    use crate::crd::{PinotSchema, PinotSchemaSpec, ResourcePhase};
    use crate::domain::ResourceKey;
    use crate::testing::FakeStatusSink;
    use std::sync::Arc;

    fn schema() -> PinotSchema {
        let mut s = PinotSchema::new("events", PinotSchemaSpec::default());
        s.metadata.namespace = Some("analytics".into());
        s.metadata.resource_version = Some("42".into());
        s
    }

    #[tokio::test]
    async fn test_report_replaces_status() {
        let sink = Arc::new(FakeStatusSink::new());
        let reporter = StatusReporter::new(sink.clone(), ControllerMetrics::new().unwrap());

        let outcome = ApplyOutcome::failed(REASON_CONFIGURATION_ERROR, "schema.json is required");
        reporter.report(&schema(), &outcome).await.unwrap();

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        let (target, status) = &writes[0];
        assert_eq!(target.kind, ResourceKind::Schema);
        assert_eq!(target.key, ResourceKey::new("analytics", "events"));
        assert_eq!(target.resource_version.as_deref(), Some("42"));
        assert_eq!(status.r#type, "Schema");
        assert_eq!(status.status, ResourcePhase::Failed);
        assert_eq!(status.reason, REASON_CONFIGURATION_ERROR);
        assert!(status.last_update_time.is_some());
        assert!(status.reload_status.is_none());
    }

    #[tokio::test]
    async fn test_conflict_is_dropped() {
        let sink = Arc::new(FakeStatusSink::new());
        sink.set_conflict(true);
        let reporter = StatusReporter::new(sink.clone(), ControllerMetrics::new().unwrap());

        let outcome = ApplyOutcome::ready("Applied", "ok");
        assert!(reporter.report(&schema(), &outcome).await.is_ok());
        assert!(sink.writes().is_empty());
    }
}
