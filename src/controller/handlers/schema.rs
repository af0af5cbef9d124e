//! Schema handler

use crate::controller::handlers::{
    validate_cluster_ref, validate_payload, ApplyOutcome, GatewayCalls, ResourceHandler,
};
use crate::crd::{PinotSchema, PinotSchemaSpec};
use crate::error::Result;
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Handler for `PinotSchema` resources
pub struct SchemaHandler {
    gateway: GatewayCalls,
}

impl SchemaHandler {
    pub fn new(gateway: GatewayCalls) -> Self {
        Self { gateway }
    }

    pub fn validate(spec: &PinotSchemaSpec) -> Result<()> {
        validate_cluster_ref(&spec.pinot_cluster)?;
        validate_payload("schema.json", &spec.schema_json)
    }
}

#[async_trait]
impl ResourceHandler<PinotSchema> for SchemaHandler {
    async fn apply(&self, resource: &PinotSchema) -> ApplyOutcome {
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
                "push_schema",
                self.gateway
                    .gateway()
                    .push_schema(cluster, &name, &spec.schema_json),
            )
            .await;

        GatewayCalls::push_outcome(result, "Schema", cluster)
    }

    async fn teardown(&self, resource: &PinotSchema) -> Result<()> {
        let cluster = resource.spec.pinot_cluster.as_str();
        if cluster.is_empty() {
            return Ok(());
        }

        let name = resource.name_any();
        let deleted = self
            .gateway
            .call(
                cluster,
                "delete_schema",
                self.gateway.gateway().delete_schema(cluster, &name),
            )
            .await?;
        info!(cluster, schema = %name, deleted, "Schema deleted");
        Ok(())
    }

    async fn reconcile(&self, resource: &PinotSchema) -> ApplyOutcome {
        let outcome = self.apply(resource).await;
        self.gateway
            .with_health(&resource.spec.pinot_cluster, outcome)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::handlers::{
        REASON_APPLIED, REASON_CONFIGURATION_ERROR, REASON_GATEWAY_REJECTED,
    };
    use crate::crd::ResourcePhase;
    use crate::testing::FakeGateway;
    use std::sync::Arc;
    use std::time::Duration;

    fn schema(payload: &str) -> PinotSchema {
        let mut s = PinotSchema::new(
            "events",
            PinotSchemaSpec {
                pinot_cluster: "c1".into(),
                schema_json: payload.into(),
            },
        );
        s.metadata.namespace = Some("default".into());
        s
    }

    fn handler() -> (Arc<FakeGateway>, SchemaHandler) {
        let gateway = Arc::new(FakeGateway::new());
        let handler = SchemaHandler::new(GatewayCalls::new(gateway.clone(), Duration::from_secs(1)));
        (gateway, handler)
    }

    #[tokio::test]
    async fn test_invalid_payload_never_calls_gateway() {
        let (gateway, handler) = handler();

        let outcome = handler.apply(&schema("schemaName: events")).await;
        assert_eq!(outcome.phase, ResourcePhase::Failed);
        assert_eq!(outcome.reason, REASON_CONFIGURATION_ERROR);
        assert!(!outcome.reason.is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_cluster_rejected() {
        let (gateway, handler) = handler();
        let mut resource = schema("{}");
        resource.spec.pinot_cluster.clear();

        let outcome = handler.apply(&resource).await;
        assert_eq!(outcome.reason, REASON_CONFIGURATION_ERROR);
        assert!(outcome.message.contains("pinotCluster"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_push_outcomes() {
        let (gateway, handler) = handler();
        let resource = schema(r#"{"schemaName": "events"}"#);

        let outcome = handler.apply(&resource).await;
        assert_eq!(outcome.reason, REASON_APPLIED);
        assert_eq!(gateway.calls(), vec!["push_schema c1/events"]);

        gateway.set_reject(true);
        let outcome = handler.apply(&resource).await;
        assert_eq!(outcome.reason, REASON_GATEWAY_REJECTED);

        gateway.set_reject(false);
        gateway.set_unavailable(true);
        let outcome = handler.apply(&resource).await;
        assert_eq!(outcome.reason, "GatewayUnavailable");
    }

    #[tokio::test]
    async fn test_teardown_deletes_schema() {
        let (gateway, handler) = handler();
        handler.teardown(&schema("{}")).await.unwrap();
        assert_eq!(gateway.calls(), vec!["delete_schema c1/events"]);
    }
}
