//! Kubernetes status sink
//!
//! Replaces the status subresource of a managed resource. The body carries
//! the resource version the snapshot was computed against, so a concurrent
//! write surfaces as a conflict instead of silently overwriting it.

use crate::crd::{Pinot, PinotSchema, PinotTable, PinotTenant, StatusSnapshot};
use crate::domain::{ResourceKind, StatusSink, StatusTarget};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, PostParams};
use kube::Client;
use serde_json::{json, Value};
use tracing::debug;

/// API resource descriptor for a managed kind
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    match kind {
        ResourceKind::Cluster => ApiResource::erase::<Pinot>(&()),
        ResourceKind::Schema => ApiResource::erase::<PinotSchema>(&()),
        ResourceKind::Table => ApiResource::erase::<PinotTable>(&()),
        ResourceKind::Tenant => ApiResource::erase::<PinotTenant>(&()),
    }
}

/// Build the replace body for a status write
pub fn status_body(target: &StatusTarget, status: &StatusSnapshot) -> Result<Value> {
    let ar = api_resource(target.kind);

    let mut metadata = json!({
        "name": target.key.name,
        "namespace": target.key.namespace,
    });
    if let Some(version) = &target.resource_version {
        metadata["resourceVersion"] = Value::String(version.clone());
    }

    Ok(json!({
        "apiVersion": ar.api_version,
        "kind": ar.kind,
        "metadata": metadata,
        "status": serde_json::to_value(status)?,
    }))
}

/// Status sink backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStatusSink {
    client: Client,
}

impl KubeStatusSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusSink for KubeStatusSink {
    async fn replace_status(&self, target: &StatusTarget, status: &StatusSnapshot) -> Result<()> {
        let ar = api_resource(target.kind);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &target.key.namespace, &ar);

        let body = serde_json::to_vec(&status_body(target, status)?)?;
        match api
            .replace_status(&target.key.name, &PostParams::default(), body)
            .await
        {
            Ok(_) => {
                debug!(kind = %target.kind, key = %target.key, "Status replaced");
                Ok(())
            }
            Err(e) if Error::is_conflict(&e) => Err(Error::StatusWriteConflict {
                kind: target.kind.to_string(),
                key: target.key.to_string(),
            }),
            // Object deleted before the write landed
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ResourcePhase;
    use crate::domain::ResourceKey;

    #[test]
    fn test_status_body() {
        let target = StatusTarget {
            kind: ResourceKind::Table,
            key: ResourceKey::new("analytics", "events"),
            resource_version: Some("812".into()),
        };
        let status = StatusSnapshot {
            r#type: "Table".into(),
            status: ResourcePhase::Ready,
            reason: "Applied".into(),
            message: "table pushed".into(),
            last_update_time: None,
            reload_status: Some(vec!["events_0: SUCCESS".into()]),
        };

        let body = status_body(&target, &status).unwrap();
        assert_eq!(body["apiVersion"], "pinot.io/v1");
        assert_eq!(body["kind"], "PinotTable");
        assert_eq!(body["metadata"]["namespace"], "analytics");
        assert_eq!(body["metadata"]["resourceVersion"], "812");
        assert_eq!(body["status"]["status"], "Ready");
        assert_eq!(body["status"]["reloadStatus"][0], "events_0: SUCCESS");
    }

    #[test]
    fn test_status_body_without_version() {
        let target = StatusTarget {
            kind: ResourceKind::Cluster,
            key: ResourceKey::new("default", "c1"),
            resource_version: None,
        };
        let body = status_body(&target, &StatusSnapshot::default()).unwrap();
        assert_eq!(body["kind"], "Pinot");
        assert!(body["metadata"].get("resourceVersion").is_none());
        assert!(body["status"].get("reloadStatus").is_none());
    }
}
