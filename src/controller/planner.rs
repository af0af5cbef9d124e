//! Cluster Apply Planner
//!
//! Turns one `Pinot` spec into the ordered set of backing-object operations
//! that make the platform match it:
//!
//! 1. Validate the cluster name and `deploymentOrder` (non-empty, known
//!    tags, contains `controller`). Failure touches nothing.
//! 2. Walk the order tier by tier, selecting the nodes of each tier in
//!    declaration order.
//! 3. Resolve each node's two catalog references. A dangling reference is a
//!    configuration error for that node only.
//! 4. For each resolved node issue workload, endpoint and config bundle
//!    create-or-replace calls, in that order.
//!
//! Ordering is submission order only; the planner never waits for a tier
//! to become ready. A platform failure aborts the remaining nodes of the
//! invocation without rollback; the next trigger re-applies idempotently.

use crate::controller::handlers::validate_dns_label;
use crate::crd::{
    ContainerPortSpec, NodeRuntimeConfig, NodeSpec, NodeType, Pinot, PinotSpec, ServicePortSpec,
    WorkloadTemplate,
};
use crate::domain::{
    ConfigBundlePlan, EndpointPlan, ResourceKey, WorkloadPlan, WorkloadPlatformRef, APP_LABEL,
    APP_LABEL_VALUE, CLUSTER_LABEL, NODE_LABEL, NODE_TYPE_LABEL,
};
use crate::error::{Error, Result};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

// =============================================================================
// Constants
// =============================================================================

/// Port used when a template declares none
pub const DEFAULT_PORT: i32 = 8090;

/// Service type used when a template declares none
pub const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

/// Key of the rendered properties file in the config bundle
pub const PROPERTIES_KEY: &str = "pinot.properties";

// =============================================================================
// Plans
// =============================================================================

/// The three backing objects of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodePlan {
    pub node: String,
    pub node_type: NodeType,
    pub workload: WorkloadPlan,
    pub endpoint: EndpointPlan,
    pub config_bundle: ConfigBundlePlan,
}

impl NodePlan {
    /// In-cluster URL of the node's endpoint
    pub fn endpoint_url(&self) -> String {
        let port = self
            .endpoint
            .ports
            .first()
            .map(|p| p.port)
            .unwrap_or(DEFAULT_PORT);
        format!(
            "http://{}.{}.svc:{}",
            self.endpoint.name, self.endpoint.namespace, port
        )
    }
}

/// A node that could not be planned or applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node: String,
    pub reason: String,
}

/// Fully resolved plan for a cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPlan {
    pub key: ResourceKey,
    /// Resolved nodes in submission order
    pub nodes: Vec<NodePlan>,
    /// Nodes with unresolvable configuration
    pub misconfigured: Vec<NodeFailure>,
    /// Nodes whose type is not in the deployment order
    pub skipped: Vec<String>,
}

/// What one apply invocation did
#[derive(Debug)]
pub struct ApplyReport {
    /// Nodes whose three objects were all applied, in order
    pub applied: Vec<String>,
    pub misconfigured: Vec<NodeFailure>,
    pub skipped: Vec<String>,
    /// Node whose apply failed, ending the invocation
    pub aborted: Option<(String, Error)>,
    /// Management endpoint of the first applied controller node
    pub coordinator_endpoint: Option<String>,
}

impl ApplyReport {
    /// Every planned node applied and none misconfigured
    pub fn is_complete(&self) -> bool {
        self.misconfigured.is_empty() && self.aborted.is_none()
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Validate a deployment order, returning the distinct tiers in order
pub fn validate_deployment_order(order: &[String]) -> Result<Vec<NodeType>> {
    if order.is_empty() {
        return Err(Error::Configuration(
            "deploymentOrder must not be empty".into(),
        ));
    }

    let mut tiers = Vec::with_capacity(order.len());
    for tag in order {
        let tier: NodeType = tag.parse().map_err(Error::Configuration)?;
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }

    if !tiers.contains(&NodeType::COORDINATOR) {
        return Err(Error::Configuration(format!(
            "deploymentOrder must include {}",
            NodeType::COORDINATOR
        )));
    }

    Ok(tiers)
}

/// Compute the full plan for a cluster without touching the platform
pub fn plan_cluster(cluster: &Pinot) -> Result<ClusterPlan> {
    let key = ResourceKey::of(cluster);
    validate_dns_label("cluster name", &key.name)?;

    let spec = &cluster.spec;
    let tiers = validate_deployment_order(&spec.deployment_order)?;

    let mut nodes = Vec::new();
    let mut misconfigured = Vec::new();
    let mut skipped = Vec::new();

    for tier in &tiers {
        for node in spec
            .nodes
            .iter()
            .filter(|n| n.node_type.parse::<NodeType>().ok() == Some(*tier))
        {
            match resolve_node(spec, &key, node, *tier) {
                Ok(plan) => nodes.push(plan),
                Err(e) => {
                    debug!("Node {} of cluster {} is misconfigured: {}", node.name, key, e);
                    misconfigured.push(NodeFailure {
                        node: node.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    for node in &spec.nodes {
        match node.node_type.parse::<NodeType>() {
            Ok(tier) if tiers.contains(&tier) => {}
            Ok(_) => skipped.push(node.name.clone()),
            Err(reason) => misconfigured.push(NodeFailure {
                node: node.name.clone(),
                reason: Error::NodeConfiguration {
                    node: node.name.clone(),
                    reason,
                }
                .to_string(),
            }),
        }
    }

    Ok(ClusterPlan {
        key,
        nodes,
        misconfigured,
        skipped,
    })
}

fn resolve_node(
    spec: &PinotSpec,
    key: &ResourceKey,
    node: &NodeSpec,
    tier: NodeType,
) -> Result<NodePlan> {
    let node_error = |reason: String| Error::NodeConfiguration {
        node: node.name.clone(),
        reason,
    };

    validate_dns_label("node name", &node.name).map_err(|e| node_error(e.to_string()))?;

    if node.replica_count < 0 {
        return Err(node_error(format!(
            "replicas must not be negative, got {}",
            node.replica_count
        )));
    }

    let template = spec
        .workload_template(&node.workload_template_ref)
        .ok_or_else(|| {
            node_error(format!(
                "workload template {} not found in k8sConfig",
                node.workload_template_ref
            ))
        })?;

    let runtime = spec.runtime_config(&node.runtime_config_ref).ok_or_else(|| {
        node_error(format!(
            "runtime config {} not found in pinotNodeConfig",
            node.runtime_config_ref
        ))
    })?;

    Ok(render_node(spec, key, node, tier, template, runtime))
}

// =============================================================================
// Rendering
// =============================================================================

fn render_node(
    spec: &PinotSpec,
    key: &ResourceKey,
    node: &NodeSpec,
    tier: NodeType,
    template: &WorkloadTemplate,
    runtime: &NodeRuntimeConfig,
) -> NodePlan {
    let cluster = key.name.as_str();
    let namespace = key.namespace.as_str();

    let selector = BTreeMap::from([
        (APP_LABEL.to_string(), APP_LABEL_VALUE.to_string()),
        (CLUSTER_LABEL.to_string(), cluster.to_string()),
        (NODE_LABEL.to_string(), node.name.clone()),
    ]);
    let mut labels = selector.clone();
    labels.insert(NODE_TYPE_LABEL.to_string(), tier.to_string());

    let mut env = vec![
        ("PINOT_NODE_TYPE".to_string(), tier.to_string()),
        ("PINOT_CLUSTER_NAME".to_string(), cluster.to_string()),
        ("JAVA_OPTS".to_string(), runtime.runtime_options.clone()),
    ];
    if !spec.plugins.is_empty() {
        env.push(("PINOT_PLUGINS".to_string(), spec.plugins.join(",")));
    }

    let container_ports = if template.ports.is_empty() {
        vec![ContainerPortSpec {
            container_port: DEFAULT_PORT,
            protocol: None,
        }]
    } else {
        template.ports.clone()
    };

    let network = template.network.as_ref();
    let service_ports = match network.map(|n| n.ports.as_slice()) {
        Some(ports) if !ports.is_empty() => ports.to_vec(),
        _ => container_ports
            .iter()
            .map(|p| ServicePortSpec {
                port: p.container_port,
                target_port: Some(p.container_port),
                protocol: p.protocol.clone(),
            })
            .collect(),
    };
    let service_type = network
        .and_then(|n| n.service_type.clone())
        .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());

    let workload = WorkloadPlan {
        namespace: namespace.to_string(),
        name: node.name.clone(),
        cluster: cluster.to_string(),
        node_type: tier,
        replicas: node.replica_count,
        image: template.image.clone(),
        ports: container_ports,
        env,
        labels: labels.clone(),
        selector: selector.clone(),
    };

    let endpoint = EndpointPlan {
        namespace: namespace.to_string(),
        name: format!("{}-service", node.name),
        service_type,
        ports: service_ports,
        labels: labels.clone(),
        selector,
    };

    let config_bundle = ConfigBundlePlan {
        namespace: namespace.to_string(),
        name: format!("{}-config", node.name),
        labels,
        data: BTreeMap::from([(
            PROPERTIES_KEY.to_string(),
            render_properties(spec, cluster, tier, runtime),
        )]),
    };

    NodePlan {
        node: node.name.clone(),
        node_type: tier,
        workload,
        endpoint,
        config_bundle,
    }
}

/// Render the node's `pinot.properties`
pub fn render_properties(
    spec: &PinotSpec,
    cluster: &str,
    tier: NodeType,
    runtime: &NodeRuntimeConfig,
) -> String {
    let mut lines = vec![
        format!("pinot.node.type={}", tier),
        format!("pinot.cluster.name={}", cluster),
    ];
    if let Some(zk) = spec.zookeeper_address() {
        lines.push(format!("pinot.zookeeper.address={}", zk));
    }
    lines.push(format!("pinot.data.dir={}", runtime.data_dir));
    lines.push(format!("pinot.java.opts={}", runtime.runtime_options));
    if let Some(location) = spec.deep_storage_for(tier) {
        lines.push(format!("pinot.deep.storage={}", location));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// =============================================================================
// Planner
// =============================================================================

/// Issues the planned operations against the workload platform
pub struct ClusterApplyPlanner {
    platform: WorkloadPlatformRef,
}

impl ClusterApplyPlanner {
    pub fn new(platform: WorkloadPlatformRef) -> Self {
        Self { platform }
    }

    /// Converge the platform to the cluster's spec
    ///
    /// `Err` only for cluster-level validation failures, in which case no
    /// object was touched.
    pub async fn apply(&self, cluster: &Pinot) -> Result<ApplyReport> {
        let plan = plan_cluster(cluster)?;
        let key = plan.key.clone();

        info!(
            cluster = %key,
            nodes = plan.nodes.len(),
            misconfigured = plan.misconfigured.len(),
            skipped = plan.skipped.len(),
            "Applying cluster"
        );

        let mut report = ApplyReport {
            applied: Vec::with_capacity(plan.nodes.len()),
            misconfigured: plan.misconfigured,
            skipped: plan.skipped,
            aborted: None,
            coordinator_endpoint: None,
        };

        for node in &plan.nodes {
            if let Err(e) = self.apply_node(node).await {
                error!(cluster = %key, node = %node.node, "Node apply failed: {}", e);
                report.aborted = Some((node.node.clone(), e));
                break;
            }

            if node.node_type == NodeType::COORDINATOR && report.coordinator_endpoint.is_none() {
                report.coordinator_endpoint = Some(node.endpoint_url());
            }
            report.applied.push(node.node.clone());
        }

        Ok(report)
    }

    async fn apply_node(&self, node: &NodePlan) -> Result<()> {
        debug!("Applying workload {}", node.workload.name);
        self.platform.apply_workload(&node.workload).await?;

        debug!("Applying endpoint {}", node.endpoint.name);
        self.platform.apply_endpoint(&node.endpoint).await?;

        debug!("Applying config bundle {}", node.config_bundle.name);
        self.platform.apply_config_bundle(&node.config_bundle).await?;

        Ok(())
    }

    /// Delete every backing object carrying the cluster's identity label
    pub async fn teardown(&self, cluster: &Pinot) -> Result<usize> {
        let key = ResourceKey::of(cluster);
        let removed = self
            .platform
            .delete_cluster_objects(&key.namespace, &cluster.name_any())
            .await?;
        info!(cluster = %key, removed, "Cluster backing objects deleted");
        Ok(removed)
    }
}
