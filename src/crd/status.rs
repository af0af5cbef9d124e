//! Shared resource status
//!
//! Every managed kind carries the same status shape. A snapshot is always
//! written as a whole; fields are never merged into a previous status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of the latest apply or reconciliation attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ResourcePhase {
    Ready,
    #[default]
    Failed,
}

impl std::fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourcePhase::Ready => write!(f, "Ready"),
            ResourcePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Normalized status snapshot written back to a managed resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Kind tag (Cluster, Schema, Table, Tenant)
    #[serde(default)]
    pub r#type: String,

    /// Ready or Failed
    #[serde(default)]
    pub status: ResourcePhase,

    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// When this snapshot was produced
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Per-segment reload results (tables only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_status: Option<Vec<String>>,
}

impl StatusSnapshot {
    /// Check if the snapshot reports Ready
    pub fn is_ready(&self) -> bool {
        self.status == ResourcePhase::Ready
    }
}
