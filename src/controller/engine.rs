//! Reconciliation Engine
//!
//! Wires one registry, dispatcher, watch and scheduler per kind and runs
//! them as independent tasks (a watch context and a scheduler context for
//! each of the four kinds). Registries are created here and shared by
//! reference; nothing is global.

use crate::config::EngineConfig;
use crate::controller::dispatcher::Dispatcher;
use crate::controller::handlers::{
    ClusterHandler, GatewayCalls, ResourceHandler, SchemaHandler, TableHandler, TenantHandler,
};
use crate::controller::planner::ClusterApplyPlanner;
use crate::controller::scheduler::ReconciliationScheduler;
use crate::controller::status::StatusReporter;
use crate::controller::watch::ResourceWatch;
use crate::crd::{Pinot, PinotSchema, PinotTable, PinotTenant};
use crate::domain::{
    ClusterGatewayRef, ManagedResource, ResourceKey, ResourceKind, ResourceSourceRef,
    StatusSinkRef, WorkloadPlatformRef,
};
use crate::metrics::ControllerMetrics;
use crate::registry::{ManagedRegistry, RegistryStatsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// =============================================================================
// Registries
// =============================================================================

/// The four per-kind registries, read by the introspection API
#[derive(Debug, Default)]
pub struct Registries {
    pub clusters: Arc<ManagedRegistry<Pinot>>,
    pub schemas: Arc<ManagedRegistry<PinotSchema>>,
    pub tables: Arc<ManagedRegistry<PinotTable>>,
    pub tenants: Arc<ManagedRegistry<PinotTenant>>,
}

fn to_json<K: Serialize>(items: Vec<K>) -> Vec<serde_json::Value> {
    items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every managed resource of a kind, as JSON
    pub fn list(&self, kind: ResourceKind) -> Vec<serde_json::Value> {
        match kind {
            ResourceKind::Cluster => to_json(self.clusters.snapshot()),
            ResourceKind::Schema => to_json(self.schemas.snapshot()),
            ResourceKind::Table => to_json(self.tables.snapshot()),
            ResourceKind::Tenant => to_json(self.tenants.snapshot()),
        }
    }

    /// One managed resource, as JSON
    pub fn get(&self, kind: ResourceKind, key: &ResourceKey) -> Option<serde_json::Value> {
        let value = match kind {
            ResourceKind::Cluster => self.clusters.get(key).map(serde_json::to_value),
            ResourceKind::Schema => self.schemas.get(key).map(serde_json::to_value),
            ResourceKind::Table => self.tables.get(key).map(serde_json::to_value),
            ResourceKind::Tenant => self.tenants.get(key).map(serde_json::to_value),
        };
        value.and_then(|v| v.ok())
    }

    /// Whether a key is managed for a kind
    pub fn is_managed(&self, kind: ResourceKind, key: &ResourceKey) -> bool {
        match kind {
            ResourceKind::Cluster => self.clusters.contains(key),
            ResourceKind::Schema => self.schemas.contains(key),
            ResourceKind::Table => self.tables.contains(key),
            ResourceKind::Tenant => self.tenants.contains(key),
        }
    }

    /// Entry count per kind
    pub fn counts(&self) -> BTreeMap<String, usize> {
        BTreeMap::from([
            (ResourceKind::Cluster.plural().to_string(), self.clusters.len()),
            (ResourceKind::Schema.plural().to_string(), self.schemas.len()),
            (ResourceKind::Table.plural().to_string(), self.tables.len()),
            (ResourceKind::Tenant.plural().to_string(), self.tenants.len()),
        ])
    }

    /// Registry counters per kind
    pub fn stats(&self) -> BTreeMap<String, RegistryStatsSnapshot> {
        BTreeMap::from([
            (ResourceKind::Cluster.plural().to_string(), self.clusters.stats()),
            (ResourceKind::Schema.plural().to_string(), self.schemas.stats()),
            (ResourceKind::Table.plural().to_string(), self.tables.stats()),
            (ResourceKind::Tenant.plural().to_string(), self.tenants.stats()),
        ])
    }

    /// True once every kind has completed its first full list
    pub fn all_synced(&self) -> bool {
        self.clusters.is_synced()
            && self.schemas.is_synced()
            && self.tables.is_synced()
            && self.tenants.is_synced()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Resource sources, one per kind
pub struct Sources {
    pub clusters: ResourceSourceRef<Pinot>,
    pub schemas: ResourceSourceRef<PinotSchema>,
    pub tables: ResourceSourceRef<PinotTable>,
    pub tenants: ResourceSourceRef<PinotTenant>,
}

/// External collaborators of the engine
pub struct EngineDeps {
    pub sources: Sources,
    pub platform: WorkloadPlatformRef,
    pub gateway: ClusterGatewayRef,
    pub status_sink: StatusSinkRef,
}

/// The reconciliation engine
pub struct Engine {
    config: EngineConfig,
    registries: Arc<Registries>,
    sources: Sources,
    clusters: Arc<Dispatcher<Pinot>>,
    schemas: Arc<Dispatcher<PinotSchema>>,
    tables: Arc<Dispatcher<PinotTable>>,
    tenants: Arc<Dispatcher<PinotTenant>>,
}

impl Engine {
    /// Build the engine and all per-kind components
    pub fn new(config: EngineConfig, deps: EngineDeps, metrics: ControllerMetrics) -> Self {
        let registries = Arc::new(Registries::new());
        let reporter = Arc::new(StatusReporter::new(deps.status_sink, metrics.clone()));
        let gateway = GatewayCalls::new(deps.gateway, config.gateway_timeout());

        let cluster_handler = Arc::new(ClusterHandler::new(
            ClusterApplyPlanner::new(deps.platform),
            gateway.clone(),
        ));
        let schema_handler = Arc::new(SchemaHandler::new(gateway.clone()));
        let table_handler = Arc::new(TableHandler::new(gateway.clone()));
        let tenant_handler = Arc::new(TenantHandler::new(gateway));

        Self {
            clusters: dispatcher(&registries.clusters, cluster_handler, &reporter, &metrics),
            schemas: dispatcher(&registries.schemas, schema_handler, &reporter, &metrics),
            tables: dispatcher(&registries.tables, table_handler, &reporter, &metrics),
            tenants: dispatcher(&registries.tenants, tenant_handler, &reporter, &metrics),
            config,
            registries,
            sources: deps.sources,
        }
    }

    /// Shared view of the registries
    pub fn registries(&self) -> Arc<Registries> {
        self.registries.clone()
    }

    /// Spawn a watch and a scheduler task for every kind
    pub fn spawn(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(ResourceKind::ALL.len() * 2);
        self.spawn_kind(&self.sources.clusters, &self.clusters, shutdown, &mut handles);
        self.spawn_kind(&self.sources.schemas, &self.schemas, shutdown, &mut handles);
        self.spawn_kind(&self.sources.tables, &self.tables, shutdown, &mut handles);
        self.spawn_kind(&self.sources.tenants, &self.tenants, shutdown, &mut handles);
        info!(tasks = handles.len(), "Reconciliation engine started");
        handles
    }

    fn spawn_kind<K: ManagedResource>(
        &self,
        source: &ResourceSourceRef<K>,
        dispatcher: &Arc<Dispatcher<K>>,
        shutdown: &CancellationToken,
        handles: &mut Vec<JoinHandle<()>>,
    ) {
        let watch = ResourceWatch::new(
            source.clone(),
            dispatcher.clone(),
            self.config.watch_retry_delay(),
        );
        handles.push(tokio::spawn(watch.run(shutdown.clone())));

        let scheduler =
            ReconciliationScheduler::new(dispatcher.clone(), self.config.reconcile_interval());
        handles.push(tokio::spawn(scheduler.run(shutdown.clone())));
    }

    /// Run until shutdown and wait for every task to stop
    pub async fn run(self, shutdown: CancellationToken) {
        let handles = self.spawn(&shutdown);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Engine task failed: {}", e);
            }
        }
        info!("Reconciliation engine stopped");
    }
}

fn dispatcher<K: ManagedResource>(
    registry: &Arc<ManagedRegistry<K>>,
    handler: Arc<dyn ResourceHandler<K>>,
    reporter: &Arc<StatusReporter>,
    metrics: &ControllerMetrics,
) -> Arc<Dispatcher<K>> {
    Arc::new(Dispatcher::new(
        registry.clone(),
        handler,
        reporter.clone(),
        metrics.clone(),
    ))
}
