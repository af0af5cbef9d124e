//! PinotTenant CRD

use crate::crd::StatusSnapshot;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Pinot tenant managed by the operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pinot.io",
    version = "v1",
    kind = "PinotTenant",
    plural = "pinottenants",
    shortname = "pten",
    status = "StatusSnapshot",
    printcolumn = r#"{"name": "Cluster", "type": "string", "jsonPath": ".spec.pinotCluster"}"#,
    printcolumn = r#"{"name": "Status", "type": "string", "jsonPath": ".status.status"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PinotTenantSpec {
    /// Target cluster name
    #[serde(default)]
    pub pinot_cluster: String,

    /// Tenant config document
    #[serde(default)]
    pub tenant_config: String,
}
