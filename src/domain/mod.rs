//! Domain layer - Resource identity and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod ports;
pub mod resource;

pub use ports::*;
pub use resource::*;
