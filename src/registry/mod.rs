//! Resource registries
//!
//! One [`ManagedRegistry`] per kind, plus the lock table that serializes
//! work on a single key.

pub mod inflight;
pub mod managed;

pub use inflight::KeyedLocks;
pub use managed::{ManagedRegistry, RegistryStatsSnapshot, ResyncDiff};
