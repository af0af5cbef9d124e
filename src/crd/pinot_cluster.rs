//! Pinot CRD
//!
//! Declares a complete Pinot cluster: the order in which node tiers are
//! submitted, the two named catalogs nodes draw from, the node list itself
//! and the external services the cluster depends on.

use crate::crd::StatusSnapshot;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Pinot CRD
// =============================================================================

/// A Pinot cluster managed by the operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pinot.io",
    version = "v1",
    kind = "Pinot",
    plural = "pinots",
    shortname = "pc",
    status = "StatusSnapshot",
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.status"}"#,
    printcolumn = r#"{"name": "Reason", "type": "string", "jsonPath": ".status.reason"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PinotSpec {
    /// Node-type tags in submission order; must contain `controller`
    #[serde(default)]
    pub deployment_order: Vec<String>,

    /// Catalog of workload templates referenced by nodes
    #[serde(default, rename = "k8sConfig")]
    pub workload_templates: Vec<WorkloadTemplate>,

    /// Catalog of runtime configurations referenced by nodes
    #[serde(default, rename = "pinotNodeConfig")]
    pub node_runtime_configs: Vec<NodeRuntimeConfig>,

    /// Nodes to run
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// External dependencies
    #[serde(default)]
    pub external: ExternalSpec,

    /// Authentication settings
    #[serde(default)]
    pub auth: Option<AuthSpec>,

    /// Plugins to load on every node
    #[serde(default)]
    pub plugins: Vec<String>,
}

// =============================================================================
// Node Types
// =============================================================================

/// Pinot node tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Controller,
    Broker,
    Server,
    Minion,
}

impl NodeType {
    /// The tag every well-formed deployment order must contain
    pub const COORDINATOR: NodeType = NodeType::Controller;

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Controller => "controller",
            NodeType::Broker => "broker",
            NodeType::Server => "server",
            NodeType::Minion => "minion",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "controller" => Ok(NodeType::Controller),
            "broker" => Ok(NodeType::Broker),
            "server" => Ok(NodeType::Server),
            "minion" => Ok(NodeType::Minion),
            other => Err(format!("unknown node type: {}", other)),
        }
    }
}

// =============================================================================
// Catalogs
// =============================================================================

/// Workload template: image plus network shape
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTemplate {
    /// Catalog name
    pub name: String,

    /// Container image
    pub image: String,

    /// Container ports
    #[serde(default, rename = "port")]
    pub ports: Vec<ContainerPortSpec>,

    /// Stable endpoint settings
    #[serde(default, rename = "service")]
    pub network: Option<NetworkSpec>,
}

/// Container port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPortSpec {
    pub container_port: i32,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Network endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Service type, e.g. ClusterIP
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,

    /// Exposed ports
    #[serde(default)]
    pub ports: Vec<ServicePortSpec>,
}

/// Exposed service port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortSpec {
    pub port: i32,
    #[serde(default)]
    pub target_port: Option<i32>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Runtime configuration for a node
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeRuntimeConfig {
    /// Catalog name
    pub name: String,

    /// JVM options
    #[serde(default, rename = "java_opts")]
    pub runtime_options: String,

    /// Data directory
    #[serde(default, rename = "data")]
    pub data_dir: String,
}

// =============================================================================
// Nodes
// =============================================================================

/// A node group within the cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Node name, also the workload name
    pub name: String,

    /// Node-type tag
    pub node_type: String,

    /// Desired replica count
    #[serde(default = "default_replicas", rename = "replicas")]
    pub replica_count: i32,

    /// Name of a workload template in the catalog
    #[serde(rename = "k8sConfig")]
    pub workload_template_ref: String,

    /// Name of a runtime config in the catalog
    #[serde(rename = "pinotNodeConfig")]
    pub runtime_config_ref: String,
}

// =============================================================================
// External Dependencies
// =============================================================================

/// External services
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSpec {
    /// Zookeeper coordination service
    #[serde(default)]
    pub zookeeper: Option<ZookeeperSpec>,

    /// Deep storage locations per node type
    #[serde(default)]
    pub deep_storage: Option<DeepStorageSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ZookeeperSpec {
    pub spec: ZookeeperConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperConfig {
    pub zk_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeepStorageSpec {
    #[serde(default)]
    pub spec: Vec<DeepStorageConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeepStorageConfig {
    pub node_type: String,
    pub data: String,
}

// =============================================================================
// Auth
// =============================================================================

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub secret_ref: Option<SecretReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AuthType {
    #[serde(rename = "basic-auth")]
    BasicAuth,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SecretReference {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_replicas() -> i32 {
    1
}

// =============================================================================
// Implementations
// =============================================================================

impl PinotSpec {
    /// Look up a workload template by name
    pub fn workload_template(&self, name: &str) -> Option<&WorkloadTemplate> {
        self.workload_templates.iter().find(|t| t.name == name)
    }

    /// Look up a runtime config by name
    pub fn runtime_config(&self, name: &str) -> Option<&NodeRuntimeConfig> {
        self.node_runtime_configs.iter().find(|c| c.name == name)
    }

    /// Coordination service address, if configured
    pub fn zookeeper_address(&self) -> Option<&str> {
        self.external
            .zookeeper
            .as_ref()
            .map(|zk| zk.spec.zk_address.as_str())
            .filter(|addr| !addr.is_empty())
    }

    /// Deep storage location for a node type, if configured
    pub fn deep_storage_for(&self, node_type: NodeType) -> Option<&str> {
        self.external.deep_storage.as_ref().and_then(|ds| {
            ds.spec
                .iter()
                .find(|entry| entry.node_type.parse::<NodeType>().ok() == Some(node_type))
                .map(|entry| entry.data.as_str())
        })
    }
}
