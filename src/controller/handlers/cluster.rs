//! Cluster handler
//!
//! Applies a `Pinot` resource through the planner, registers the cluster's
//! management endpoint once its controller node is submitted, and tears
//! everything down by label on deletion.

use crate::controller::handlers::{
    ApplyOutcome, GatewayCalls, ResourceHandler, REASON_APPLIED, REASON_CONFIGURATION_ERROR,
};
use crate::controller::planner::{ApplyReport, ClusterApplyPlanner};
use crate::crd::Pinot;
use crate::error::Result;
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Handler for `Pinot` resources
pub struct ClusterHandler {
    planner: ClusterApplyPlanner,
    gateway: GatewayCalls,
}

impl ClusterHandler {
    pub fn new(planner: ClusterApplyPlanner, gateway: GatewayCalls) -> Self {
        Self { planner, gateway }
    }

    fn outcome(report: &ApplyReport) -> ApplyOutcome {
        if let Some((node, err)) = &report.aborted {
            return ApplyOutcome::failed(
                err.reason(),
                format!(
                    "Apply aborted at node {} after {} node(s): {}",
                    node,
                    report.applied.len(),
                    err
                ),
            );
        }

        if !report.misconfigured.is_empty() {
            let details: Vec<String> = report
                .misconfigured
                .iter()
                .map(|f| f.reason.clone())
                .collect();
            return ApplyOutcome::failed(
                REASON_CONFIGURATION_ERROR,
                format!(
                    "Applied {} node(s), {} misconfigured: {}",
                    report.applied.len(),
                    report.misconfigured.len(),
                    details.join("; ")
                ),
            );
        }

        let mut message = format!("Applied {} node(s)", report.applied.len());
        if !report.skipped.is_empty() {
            message.push_str(&format!(
                ", skipped {} not in deploymentOrder: {}",
                report.skipped.len(),
                report.skipped.join(", ")
            ));
        }
        ApplyOutcome::ready(REASON_APPLIED, message)
    }
}

#[async_trait]
impl ResourceHandler<Pinot> for ClusterHandler {
    async fn apply(&self, resource: &Pinot) -> ApplyOutcome {
        let report = match self.planner.apply(resource).await {
            Ok(report) => report,
            Err(e) => return ApplyOutcome::from_error(&e),
        };

        if let Some(endpoint) = &report.coordinator_endpoint {
            let name = resource.name_any();
            if self.gateway.gateway().endpoint(&name).as_deref() != Some(endpoint.as_str()) {
                info!(cluster = %name, endpoint = %endpoint, "Registering cluster endpoint");
                self.gateway.gateway().register_endpoint(&name, endpoint);
            }
        }

        Self::outcome(&report)
    }

    async fn teardown(&self, resource: &Pinot) -> Result<()> {
        self.gateway.gateway().unregister_endpoint(&resource.name_any());
        self.planner.teardown(resource).await?;
        Ok(())
    }

    async fn reconcile(&self, resource: &Pinot) -> ApplyOutcome {
        let outcome = self.apply(resource).await;
        self.gateway.with_health(&resource.name_any(), outcome).await
    }
}
