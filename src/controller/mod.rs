//! Reconciliation controller
//!
//! - [`watch`]: supervised list-then-watch loop per kind
//! - [`dispatcher`]: event routing, registry mutation, single-flight work
//! - [`planner`]: ordered backing-object plan for a cluster
//! - [`handlers`]: per-kind apply, teardown and reconcile
//! - [`status`]: status write-back
//! - [`scheduler`]: periodic reconciliation
//! - [`engine`]: wiring of all of the above

pub mod dispatcher;
pub mod engine;
pub mod handlers;
pub mod planner;
pub mod scheduler;
pub mod status;
pub mod watch;

pub use dispatcher::{Dispatcher, Flow, ReconcileAttempt};
pub use engine::{Engine, EngineDeps, Registries, Sources};
pub use handlers::{ApplyOutcome, ResourceHandler};
pub use planner::{ApplyReport, ClusterApplyPlanner, ClusterPlan, NodePlan};
pub use scheduler::{PassReport, ReconciliationScheduler};
pub use status::StatusReporter;
pub use watch::ResourceWatch;
