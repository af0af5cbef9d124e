//! Managed resource identity
//!
//! Every resource tracked by the engine is identified by its kind plus a
//! `namespace/name` key. The kind-specific CRD types are tied to their
//! identity through the [`ManagedResource`] trait.

use crate::crd::{Pinot, PinotSchema, PinotTable, PinotTenant, StatusSnapshot};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

// =============================================================================
// Resource Kind
// =============================================================================

/// The four kinds of managed resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cluster,
    Schema,
    Table,
    Tenant,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Cluster,
        ResourceKind::Schema,
        ResourceKind::Table,
        ResourceKind::Tenant,
    ];

    /// Tag written into the status `type` field
    pub fn status_tag(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "Cluster",
            ResourceKind::Schema => "Schema",
            ResourceKind::Table => "Table",
            ResourceKind::Tenant => "Tenant",
        }
    }

    /// Plural form used in API paths
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "clusters",
            ResourceKind::Schema => "schemas",
            ResourceKind::Table => "tables",
            ResourceKind::Tenant => "tenants",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Cluster => write!(f, "cluster"),
            ResourceKind::Schema => write!(f, "schema"),
            ResourceKind::Table => write!(f, "table"),
            ResourceKind::Tenant => write!(f, "tenant"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Accepts both singular and plural spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cluster" | "clusters" => Ok(ResourceKind::Cluster),
            "schema" | "schemas" => Ok(ResourceKind::Schema),
            "table" | "tables" => Ok(ResourceKind::Table),
            "tenant" | "tenants" => Ok(ResourceKind::Tenant),
            other => Err(format!("invalid resource type: {}", other)),
        }
    }
}

// =============================================================================
// Resource Key
// =============================================================================

/// Registry key: `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a kube object; cluster-scoped objects fall back to `default`
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            obj.name_any(),
        )
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Managed Resource
// =============================================================================

/// A CRD type the engine watches, registers and reconciles
pub trait ManagedResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: ResourceKind;

    /// Current status, if one was ever written
    fn status_snapshot(&self) -> Option<&StatusSnapshot>;

    fn key(&self) -> ResourceKey {
        ResourceKey::of(self)
    }

    /// Spec generation; unchanged by status-only updates
    fn generation(&self) -> Option<i64> {
        self.meta().generation
    }
}

impl ManagedResource for Pinot {
    const KIND: ResourceKind = ResourceKind::Cluster;

    fn status_snapshot(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }
}

impl ManagedResource for PinotSchema {
    const KIND: ResourceKind = ResourceKind::Schema;

    fn status_snapshot(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }
}

impl ManagedResource for PinotTable {
    const KIND: ResourceKind = ResourceKind::Table;

    fn status_snapshot(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }
}

impl ManagedResource for PinotTenant {
    const KIND: ResourceKind = ResourceKind::Tenant;

    fn status_snapshot(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }
}
