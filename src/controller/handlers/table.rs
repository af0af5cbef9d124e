//! Table handler
//!
//! Pushes table configs and, when `segmentReload` is set, asks the cluster
//! to reload the table's segments after a successful push.

use crate::controller::handlers::{
    validate_cluster_ref, validate_payload, ApplyOutcome, GatewayCalls, ResourceHandler,
};
use crate::crd::{PinotTable, PinotTableSpec};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{info, warn};

/// Handler for `PinotTable` resources
pub struct TableHandler {
    gateway: GatewayCalls,
}

impl TableHandler {
    pub fn new(gateway: GatewayCalls) -> Self {
        Self { gateway }
    }

    pub fn validate(spec: &PinotTableSpec) -> Result<()> {
        validate_cluster_ref(&spec.pinot_cluster)?;
        if spec.pinot_schema.trim().is_empty() {
            return Err(Error::Configuration("pinotSchema is required".into()));
        }
        if spec.pinot_table_type.trim().is_empty() {
            return Err(Error::Configuration("pinotTableType is required".into()));
        }
        if spec.table_type().is_none() {
            return Err(Error::Configuration(format!(
                "pinotTableType must be one of realtime, offline, hybrid, got {}",
                spec.pinot_table_type
            )));
        }
        validate_payload("tables.json", &spec.tables_json)
    }
}

#[async_trait]
impl ResourceHandler<PinotTable> for TableHandler {
    async fn apply(&self, resource: &PinotTable) -> ApplyOutcome {
        let spec = &resource.spec;
        if let Err(e) = Self::validate(spec) {
            return ApplyOutcome::from_error(&e);
        }

        let name = resource.name_any();
        let cluster = spec.pinot_cluster.as_str();
        let result = self
            .gateway
            .call(
                cluster,
                "push_table",
                self.gateway
                    .gateway()
                    .push_table(cluster, &name, &spec.tables_json),
            )
            .await;

        let outcome = GatewayCalls::push_outcome(result, "Table", cluster);
        if !outcome.is_ready() || !spec.segment_reload {
            return outcome;
        }

        let reload = self
            .gateway
            .call(
                cluster,
                "reload_table_segments",
                self.gateway.gateway().reload_table_segments(cluster, &name),
            )
            .await;

        match reload {
            Ok(statuses) => {
                info!(cluster, table = %name, segments = statuses.len(), "Segments reloaded");
                outcome.with_reload_status(statuses)
            }
            Err(e) => {
                warn!(cluster, table = %name, "Segment reload failed: {}", e);
                ApplyOutcome::from_error(&e)
            }
        }
    }

    async fn teardown(&self, resource: &PinotTable) -> Result<()> {
        let cluster = resource.spec.pinot_cluster.as_str();
        if cluster.is_empty() {
            return Ok(());
        }

        let name = resource.name_any();
        let deleted = self
            .gateway
            .call(
                cluster,
                "delete_table",
                self.gateway.gateway().delete_table(cluster, &name),
            )
            .await?;
        info!(cluster, table = %name, deleted, "Table deleted");
        Ok(())
    }

    async fn reconcile(&self, resource: &PinotTable) -> ApplyOutcome {
        let outcome = self.apply(resource).await;
        self.gateway
            .with_health(&resource.spec.pinot_cluster, outcome)
            .await
    }
}
