//! Pinot Operator
//!
//! A Kubernetes control plane that keeps Apache Pinot clusters and their
//! logical resources (schemas, tables, tenants) in line with declared
//! custom resources.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      Reconciliation Engine                           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐  │
//! │  │ ResourceWatch│──▶│  Dispatcher  │──▶│ Handlers (per kind)      │  │
//! │  │ (per kind)   │   │  + key locks │   │ planner / gateway calls  │  │
//! │  └──────────────┘   └──────┬───────┘   └────────────┬─────────────┘  │
//! │  ┌──────────────┐          │                        │                │
//! │  │  Scheduler   │──────────┤             ┌──────────┴─────────────┐  │
//! │  │ (per kind)   │          ▼             │    StatusReporter      │  │
//! │  └──────────────┘   ┌──────────────┐     └────────────────────────┘  │
//! │                     │  Registries  │◀──── Introspection API          │
//! │                     └──────────────┘                                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Kubernetes adapters (apply, watch, status)  │  Pinot REST gateway   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Resource identity and the ports to external systems
//! - [`registry`]: In-memory registries and per-key locks
//! - [`controller`]: Watches, dispatch, planning, scheduling, engine wiring
//! - [`kubernetes`]: Kubernetes adapters for the ports
//! - [`gateway`]: Pinot controller REST gateway
//! - [`api`]: Read-only introspection API
//! - [`config`], [`metrics`], [`error`]: Configuration, metrics and errors

pub mod api;
pub mod config;
pub mod controller;
pub mod crd;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod kubernetes;
pub mod metrics;
pub mod registry;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig};
pub use config::EngineConfig;
pub use controller::{Engine, EngineDeps, Registries, Sources};

pub use crd::{
    NodeType, Pinot, PinotSchema, PinotSchemaSpec, PinotSpec, PinotTable, PinotTableSpec,
    PinotTenant, PinotTenantSpec, ResourcePhase, StatusSnapshot,
};

pub use domain::{
    ClusterGateway, ManagedResource, ResourceKey, ResourceKind, ResourceSource, StatusSink,
    WorkloadPlatform,
};

pub use error::{Error, ErrorAction, Result};

pub use gateway::HttpClusterGateway;
pub use kubernetes::{KubePlatform, KubeResourceSource, KubeStatusSink};
pub use metrics::ControllerMetrics;
pub use registry::ManagedRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
