//! PinotTable CRD

use crate::crd::StatusSnapshot;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Pinot table managed by the operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pinot.io",
    version = "v1",
    kind = "PinotTable",
    plural = "pinottables",
    shortname = "ptab",
    status = "StatusSnapshot",
    printcolumn = r#"{"name": "Cluster", "type": "string", "jsonPath": ".spec.pinotCluster"}"#,
    printcolumn = r#"{"name": "Type", "type": "string", "jsonPath": ".spec.pinotTableType"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.status"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PinotTableSpec {
    /// Target cluster name
    #[serde(default)]
    pub pinot_cluster: String,

    /// Name of the schema the table is bound to
    #[serde(default)]
    pub pinot_schema: String,

    /// realtime, offline or hybrid
    #[serde(default)]
    pub pinot_table_type: String,

    /// Table config document
    #[serde(default, rename = "tables.json")]
    pub tables_json: String,

    /// Reload segments after a successful push
    #[serde(default)]
    pub segment_reload: bool,
}

/// Pinot table type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Realtime,
    Offline,
    Hybrid,
}

impl std::str::FromStr for TableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realtime" => Ok(TableType::Realtime),
            "offline" => Ok(TableType::Offline),
            "hybrid" => Ok(TableType::Hybrid),
            other => Err(format!("unknown table type: {}", other)),
        }
    }
}

impl PinotTableSpec {
    /// Parsed table type, None when missing or unrecognized
    pub fn table_type(&self) -> Option<TableType> {
        self.pinot_table_type.parse().ok()
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableType::Realtime => write!(f, "realtime"),
            TableType::Offline => write!(f, "offline"),
            TableType::Hybrid => write!(f, "hybrid"),
        }
    }
}
