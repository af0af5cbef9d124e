//! Domain Ports - Core trait definitions for the Pinot operator
//!
//! These traits define the boundaries between the reconciliation engine and
//! external systems: the orchestration platform that runs workloads, the
//! Pinot management API, and the resource store that is watched and whose
//! status is written back. Adapters implement these traits to provide
//! concrete functionality.

use crate::crd::{ContainerPortSpec, NodeType, ServicePortSpec, StatusSnapshot};
use crate::domain::resource::{ResourceKey, ResourceKind};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Backing Object Plans
// =============================================================================

/// Labels shared by every backing object of a cluster
pub const APP_LABEL: &str = "app";
pub const APP_LABEL_VALUE: &str = "pinot";
pub const CLUSTER_LABEL: &str = "cluster";
pub const NODE_LABEL: &str = "node";
pub const NODE_TYPE_LABEL: &str = "node-type";

/// Desired workload for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadPlan {
    pub namespace: String,
    pub name: String,
    pub cluster: String,
    pub node_type: NodeType,
    pub replicas: i32,
    pub image: String,
    pub ports: Vec<ContainerPortSpec>,
    /// Environment in declaration order
    pub env: Vec<(String, String)>,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
}

/// Desired stable network endpoint for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPlan {
    pub namespace: String,
    pub name: String,
    pub service_type: String,
    pub ports: Vec<ServicePortSpec>,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
}

/// Desired rendered configuration bundle for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigBundlePlan {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

// =============================================================================
// Workload Platform Port
// =============================================================================

/// Port for the orchestration platform that runs cluster nodes
///
/// Every apply is create-or-replace by name.
#[async_trait]
pub trait WorkloadPlatform: Send + Sync {
    /// Create or replace a workload
    async fn apply_workload(&self, plan: &WorkloadPlan) -> Result<()>;

    /// Create or replace a network endpoint
    async fn apply_endpoint(&self, plan: &EndpointPlan) -> Result<()>;

    /// Create or replace a configuration bundle
    async fn apply_config_bundle(&self, plan: &ConfigBundlePlan) -> Result<()>;

    /// Delete every backing object labelled with the cluster identity,
    /// returning how many were removed
    async fn delete_cluster_objects(&self, namespace: &str, cluster: &str) -> Result<usize>;
}

// =============================================================================
// Cluster Gateway Port
// =============================================================================

/// Port for the Pinot management API of a running cluster
///
/// Expected negative outcomes (unknown cluster, rejected payload) are
/// `Ok(false)` / `Ok(None)`; errors are reserved for transport failures.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Register the management endpoint for a cluster
    fn register_endpoint(&self, cluster: &str, endpoint: &str);

    /// Forget a cluster's management endpoint
    fn unregister_endpoint(&self, cluster: &str);

    /// Resolve a cluster's management endpoint
    fn endpoint(&self, cluster: &str) -> Option<String>;

    /// Push a schema document
    async fn push_schema(&self, cluster: &str, name: &str, payload: &str) -> Result<bool>;

    /// Delete a schema
    async fn delete_schema(&self, cluster: &str, name: &str) -> Result<bool>;

    /// Push a table config
    async fn push_table(&self, cluster: &str, name: &str, payload: &str) -> Result<bool>;

    /// Delete a table
    async fn delete_table(&self, cluster: &str, name: &str) -> Result<bool>;

    /// Push a tenant config
    async fn push_tenant(&self, cluster: &str, name: &str, payload: &str) -> Result<bool>;

    /// Delete a tenant
    async fn delete_tenant(&self, cluster: &str, name: &str) -> Result<bool>;

    /// Reload a table's segments, returning per-segment statuses
    async fn reload_table_segments(&self, cluster: &str, table: &str) -> Result<Vec<String>>;

    /// Check cluster health
    async fn check_health(&self, cluster: &str) -> Result<bool>;

    /// Fetch cluster metadata
    async fn cluster_info(&self, cluster: &str) -> Result<Option<String>>;
}

// =============================================================================
// Resource Source Port
// =============================================================================

/// Normalized change notification
#[derive(Debug, Clone)]
pub enum ResourceEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
    /// Error reported on the stream; does not by itself end the session
    Error { code: u16, message: String },
}

impl<K> ResourceEvent<K> {
    /// Event name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ResourceEvent::Added(_) => "added",
            ResourceEvent::Modified(_) => "modified",
            ResourceEvent::Deleted(_) => "deleted",
            ResourceEvent::Error { .. } => "error",
        }
    }
}

/// Result of a full list
#[derive(Debug, Clone)]
pub struct ResourceList<K> {
    pub items: Vec<K>,
    /// Version to resume watching from
    pub version: String,
}

/// Port for listing and watching one resource kind across all namespaces
#[async_trait]
pub trait ResourceSource<K>: Send + Sync {
    /// List every object of the kind
    async fn list(&self) -> Result<ResourceList<K>>;

    /// Watch for changes after `version`; the stream ends when the
    /// subscription is closed
    async fn watch(&self, version: &str) -> Result<BoxStream<'static, Result<ResourceEvent<K>>>>;
}

// =============================================================================
// Status Sink Port
// =============================================================================

/// Object whose status is being replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    pub kind: ResourceKind,
    pub key: ResourceKey,
    /// Version the snapshot was computed against; a mismatch is a conflict
    pub resource_version: Option<String>,
}

/// Port for writing resource status
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replace the whole status; `Err(StatusWriteConflict)` on version mismatch
    async fn replace_status(&self, target: &StatusTarget, status: &StatusSnapshot) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type WorkloadPlatformRef = Arc<dyn WorkloadPlatform>;
pub type ClusterGatewayRef = Arc<dyn ClusterGateway>;
pub type StatusSinkRef = Arc<dyn StatusSink>;
pub type ResourceSourceRef<K> = Arc<dyn ResourceSource<K>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event: ResourceEvent<()> = ResourceEvent::Added(());
        assert_eq!(event.name(), "added");
        let event: ResourceEvent<()> = ResourceEvent::Error {
            code: 410,
            message: "too old resource version".into(),
        };
        assert_eq!(event.name(), "error");
    }
}
