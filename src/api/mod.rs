//! Introspection API
//!
//! Read-only REST surface over the managed registries.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
