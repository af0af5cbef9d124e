//! Tenant handler

use crate::controller::handlers::{
    validate_cluster_ref, validate_payload, ApplyOutcome, GatewayCalls, ResourceHandler,
};
use crate::crd::{PinotTenant, PinotTenantSpec};
use crate::error::Result;
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Handler for `PinotTenant` resources
pub struct TenantHandler {
    gateway: GatewayCalls,
}

impl TenantHandler {
    pub fn new(gateway: GatewayCalls) -> Self {
        Self { gateway }
    }

    pub fn validate(spec: &PinotTenantSpec) -> Result<()> {
        validate_cluster_ref(&spec.pinot_cluster)?;
        validate_payload("tenantConfig", &spec.tenant_config)
    }
}

#[async_trait]
impl ResourceHandler<PinotTenant> for TenantHandler {
    async fn apply(&self, resource: &PinotTenant) -> ApplyOutcome {
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
                "push_tenant",
                self.gateway
                    .gateway()
                    .push_tenant(cluster, &name, &spec.tenant_config),
            )
            .await;

        GatewayCalls::push_outcome(result, "Tenant", cluster)
    }

    async fn teardown(&self, resource: &PinotTenant) -> Result<()> {
        let cluster = resource.spec.pinot_cluster.as_str();
        if cluster.is_empty() {
            return Ok(());
        }

        let name = resource.name_any();
        let deleted = self
            .gateway
            .call(
                cluster,
                "delete_tenant",
                self.gateway.gateway().delete_tenant(cluster, &name),
            )
            .await?;
        info!(cluster, tenant = %name, deleted, "Tenant deleted");
        Ok(())
    }

    async fn reconcile(&self, resource: &PinotTenant) -> ApplyOutcome {
        let outcome = self.apply(resource).await;
        self.gateway
            .with_health(&resource.spec.pinot_cluster, outcome)
            .await
    }
}
