//! Custom Resource Definitions for the Pinot Operator
//!
//! This module contains all CRD types:
//! - Pinot: A complete Pinot cluster (nodes, catalogs, external services)
//! - PinotSchema: A schema pushed to a cluster
//! - PinotTable: A table config pushed to a cluster
//! - PinotTenant: A tenant config pushed to a cluster

pub mod pinot_cluster;
pub mod pinot_schema;
pub mod pinot_table;
pub mod pinot_tenant;
pub mod status;

pub use pinot_cluster::*;
pub use pinot_schema::*;
pub use pinot_table::*;
pub use pinot_tenant::*;
pub use status::*;

use kube::CustomResourceExt;

/// Render every CRD as a multi-document YAML stream
pub fn crds_yaml() -> crate::Result<String> {
    let crds = [
        Pinot::crd(),
        PinotSchema::crd(),
        PinotTable::crd(),
        PinotTenant::crd(),
    ];

    let mut out = String::new();
    for crd in crds.iter() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(crd)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crd_generation() {
        let yaml = crds_yaml().unwrap();
        assert!(yaml.contains("pinots.pinot.io"));
        assert!(yaml.contains("pinotschemas.pinot.io"));
        assert!(yaml.contains("pinottables.pinot.io"));
        assert!(yaml.contains("pinottenants.pinot.io"));
        assert_eq!(yaml.matches("---\n").count(), 4);
    }
}
