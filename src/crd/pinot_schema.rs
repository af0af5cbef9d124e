//! PinotSchema CRD
//!
//! A Pinot schema pushed to the named cluster's controller as an opaque
//! JSON document.

use crate::crd::StatusSnapshot;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Pinot schema managed by the operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pinot.io",
    version = "v1",
    kind = "PinotSchema",
    plural = "pinotschemas",
    shortname = "psch",
    status = "StatusSnapshot",
    printcolumn = r#"{"name": "Cluster", "type": "string", "jsonPath": ".spec.pinotCluster"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.status"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PinotSchemaSpec {
    /// Target cluster name
    #[serde(default)]
    pub pinot_cluster: String,

    /// Schema document
    #[serde(default, rename = "schema.json")]
    pub schema_json: String,
}
