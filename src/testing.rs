//! In-memory fakes for the engine's ports, used by unit tests

use crate::crd::{
    ContainerPortSpec, NodeRuntimeConfig, NodeSpec, Pinot, PinotSpec, StatusSnapshot,
    WorkloadTemplate,
};
use crate::domain::{
    ClusterGateway, ConfigBundlePlan, EndpointPlan, ResourceEvent, ResourceKey, ResourceList,
    ResourceSource, StatusSink, StatusTarget, WorkloadPlan, WorkloadPlatform, APP_LABEL,
    APP_LABEL_VALUE, CLUSTER_LABEL,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

/// Cluster `c1` with a controller node `n1` and a broker node `n2`
pub fn sample_cluster() -> Pinot {
    let spec = PinotSpec {
        deployment_order: vec!["controller".into(), "broker".into()],
        workload_templates: vec![template("tmplA", 9000), template("tmplB", 8099)],
        node_runtime_configs: vec![runtime_config("cfgA"), runtime_config("cfgB")],
        nodes: vec![
            node("n1", "controller", 1, "tmplA", "cfgA"),
            node("n2", "broker", 2, "tmplB", "cfgB"),
        ],
        ..Default::default()
    };
    let mut cluster = Pinot::new("c1", spec);
    cluster.metadata.namespace = Some("default".into());
    cluster.metadata.generation = Some(1);
    cluster.metadata.resource_version = Some("100".into());
    cluster
}

pub fn template(name: &str, port: i32) -> WorkloadTemplate {
    WorkloadTemplate {
        name: name.into(),
        image: "apachepinot/pinot:1.1.0".into(),
        ports: vec![ContainerPortSpec {
            container_port: port,
            protocol: None,
        }],
        network: None,
    }
}

pub fn runtime_config(name: &str) -> NodeRuntimeConfig {
    NodeRuntimeConfig {
        name: name.into(),
        runtime_options: "-Xms512M -Xmx1G".into(),
        data_dir: "/var/pinot/data".into(),
    }
}

pub fn node(name: &str, node_type: &str, replicas: i32, tmpl: &str, cfg: &str) -> NodeSpec {
    NodeSpec {
        name: name.into(),
        node_type: node_type.into(),
        replica_count: replicas,
        workload_template_ref: tmpl.into(),
        runtime_config_ref: cfg.into(),
    }
}

// =============================================================================
// Fake Platform
// =============================================================================

/// A backing object held by [`FakePlatform`]
#[derive(Debug, Clone, PartialEq)]
pub struct FakeObject {
    pub labels: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

/// Object store keyed by (kind, namespace, name) with an ordered op log
#[derive(Debug, Default)]
pub struct FakePlatform {
    objects: Mutex<BTreeMap<(String, String, String), FakeObject>>,
    ops: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    failing_deletes: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every apply of the named object fail
    pub fn fail_on(&self, name: &str) {
        *self.fail_on.lock() = Some(name.to_string());
    }

    /// Make the next `count` label-selected deletes fail
    pub fn fail_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    /// Add an object directly, bypassing the op log
    pub fn seed(&self, kind: &str, namespace: &str, name: &str, labels: &[(&str, &str)]) {
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.objects.lock().insert(
            (kind.into(), namespace.into(), name.into()),
            FakeObject {
                labels,
                body: serde_json::Value::Null,
            },
        );
    }

    /// Ordered `kind:name` log of apply calls
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    /// Every stored object
    pub fn objects(&self) -> BTreeMap<(String, String, String), FakeObject> {
        self.objects.lock().clone()
    }

    /// Names of stored objects of a kind
    pub fn names_of(&self, kind: &str) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter(|(k, _, _)| k == kind)
            .map(|(_, _, n)| n.clone())
            .collect()
    }

    fn store(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
        body: serde_json::Value,
    ) -> Result<()> {
        if self.fail_on.lock().as_deref() == Some(name) {
            return Err(Error::PlatformOperation {
                object: format!("{}/{}", kind, name),
                operation: "apply".into(),
                reason: "injected failure".into(),
            });
        }
        self.ops.lock().push(format!("{}:{}", kind, name));
        self.objects.lock().insert(
            (kind.into(), namespace.into(), name.into()),
            FakeObject {
                labels: labels.clone(),
                body,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl WorkloadPlatform for FakePlatform {
    async fn apply_workload(&self, plan: &WorkloadPlan) -> Result<()> {
        let body = serde_json::to_value(plan)?;
        self.store("workload", &plan.namespace, &plan.name, &plan.labels, body)
    }

    async fn apply_endpoint(&self, plan: &EndpointPlan) -> Result<()> {
        let body = serde_json::to_value(plan)?;
        self.store("endpoint", &plan.namespace, &plan.name, &plan.labels, body)
    }

    async fn apply_config_bundle(&self, plan: &ConfigBundlePlan) -> Result<()> {
        let body = serde_json::to_value(plan)?;
        self.store("config", &plan.namespace, &plan.name, &plan.labels, body)
    }

    async fn delete_cluster_objects(&self, namespace: &str, cluster: &str) -> Result<usize> {
        if self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::PlatformOperation {
                object: format!("{}/{}", namespace, cluster),
                operation: "delete".into(),
                reason: "injected failure".into(),
            });
        }
        let mut objects = self.objects.lock();
        let before = objects.len();
        objects.retain(|(_, ns, _), obj| {
            !(ns == namespace
                && obj.labels.get(APP_LABEL).map(String::as_str) == Some(APP_LABEL_VALUE)
                && obj.labels.get(CLUSTER_LABEL).map(String::as_str) == Some(cluster))
        });
        Ok(before - objects.len())
    }
}

// =============================================================================
// Fake Gateway
// =============================================================================

/// Gateway that records calls and answers from configurable state
#[derive(Debug, Default)]
pub struct FakeGateway {
    endpoints: DashMap<String, String>,
    unhealthy: DashMap<String, bool>,
    calls: Mutex<Vec<String>>,
    reject: AtomicBool,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer pushes with `false`
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Answer every call with a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, cluster: &str, healthy: bool) {
        self.unhealthy.insert(cluster.to_string(), !healthy);
    }

    /// Delay every async call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Ordered `operation cluster/name` log
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn record(&self, entry: String) -> Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(entry);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::GatewayUnavailable {
                cluster: "fake".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn push(&self, op: &str, cluster: &str, name: &str) -> Result<bool> {
        self.record(format!("{} {}/{}", op, cluster, name)).await?;
        Ok(!self.reject.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    fn register_endpoint(&self, cluster: &str, endpoint: &str) {
        self.endpoints
            .insert(cluster.to_string(), endpoint.to_string());
    }

    fn unregister_endpoint(&self, cluster: &str) {
        self.endpoints.remove(cluster);
    }

    fn endpoint(&self, cluster: &str) -> Option<String> {
        self.endpoints.get(cluster).map(|e| e.value().clone())
    }

    async fn push_schema(&self, cluster: &str, name: &str, _payload: &str) -> Result<bool> {
        self.push("push_schema", cluster, name).await
    }

    async fn delete_schema(&self, cluster: &str, name: &str) -> Result<bool> {
        self.push("delete_schema", cluster, name).await
    }

    async fn push_table(&self, cluster: &str, name: &str, _payload: &str) -> Result<bool> {
        self.push("push_table", cluster, name).await
    }

    async fn delete_table(&self, cluster: &str, name: &str) -> Result<bool> {
        self.push("delete_table", cluster, name).await
    }

    async fn push_tenant(&self, cluster: &str, name: &str, _payload: &str) -> Result<bool> {
        self.push("push_tenant", cluster, name).await
    }

    async fn delete_tenant(&self, cluster: &str, name: &str) -> Result<bool> {
        self.push("delete_tenant", cluster, name).await
    }

    async fn reload_table_segments(&self, cluster: &str, table: &str) -> Result<Vec<String>> {
        self.record(format!("reload_table_segments {}/{}", cluster, table))
            .await?;
        Ok(vec![
            format!("{}_0: SUCCESS", table),
            format!("{}_1: SUCCESS", table),
        ])
    }

    async fn check_health(&self, cluster: &str) -> Result<bool> {
        self.record(format!("check_health {}", cluster)).await?;
        Ok(!self.unhealthy.get(cluster).map(|v| *v).unwrap_or(false))
    }

    async fn cluster_info(&self, cluster: &str) -> Result<Option<String>> {
        self.record(format!("cluster_info {}", cluster)).await?;
        Ok(self
            .endpoint(cluster)
            .map(|e| format!("{{\"endpoint\": \"{}\"}}", e)))
    }
}

// =============================================================================
// Fake Status Sink
// =============================================================================

/// Status sink that records every write
#[derive(Debug, Default)]
pub struct FakeStatusSink {
    writes: Mutex<Vec<(StatusTarget, StatusSnapshot)>>,
    conflict: AtomicBool,
}

impl FakeStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every write with a conflict
    pub fn set_conflict(&self, conflict: bool) {
        self.conflict.store(conflict, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(StatusTarget, StatusSnapshot)> {
        self.writes.lock().clone()
    }

    /// Latest status written for a key
    pub fn latest(&self, key: &ResourceKey) -> Option<StatusSnapshot> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find(|(t, _)| &t.key == key)
            .map(|(_, s)| s.clone())
    }
}

#[async_trait]
impl StatusSink for FakeStatusSink {
    async fn replace_status(&self, target: &StatusTarget, status: &StatusSnapshot) -> Result<()> {
        if self.conflict.load(Ordering::SeqCst) {
            return Err(Error::StatusWriteConflict {
                kind: target.kind.to_string(),
                key: target.key.to_string(),
            });
        }
        self.writes.lock().push((target.clone(), status.clone()));
        Ok(())
    }
}

// =============================================================================
// Fake Source
// =============================================================================

/// One scripted list-then-watch session
pub struct FakeSession<K> {
    pub list: Vec<K>,
    pub events: Vec<Result<ResourceEvent<K>>>,
}

/// Source that replays scripted sessions, then lists the last list again
/// and watches forever without events
pub struct FakeSource<K> {
    sessions: Mutex<VecDeque<FakeSession<K>>>,
    pending: Mutex<Option<Vec<Result<ResourceEvent<K>>>>>,
    last_list: Mutex<Vec<K>>,
    lists: AtomicUsize,
}

impl<K: Clone + Send + Sync + 'static> FakeSource<K> {
    pub fn new(sessions: Vec<FakeSession<K>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            pending: Mutex::new(None),
            last_list: Mutex::new(Vec::new()),
            lists: AtomicUsize::new(0),
        }
    }

    /// Number of list calls served
    pub fn lists_served(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<K: Clone + Send + Sync + 'static> ResourceSource<K> for FakeSource<K> {
    async fn list(&self) -> Result<ResourceList<K>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().pop_front();
        let items = match next {
            Some(session) => {
                *self.last_list.lock() = session.list.clone();
                *self.pending.lock() = Some(session.events);
                session.list
            }
            None => self.last_list.lock().clone(),
        };
        Ok(ResourceList {
            items,
            version: self.lists_served().to_string(),
        })
    }

    async fn watch(&self, _version: &str) -> Result<BoxStream<'static, Result<ResourceEvent<K>>>> {
        match self.pending.lock().take() {
            Some(events) => Ok(stream::iter(events).boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}
