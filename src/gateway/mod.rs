//! Pinot controller gateway
//!
//! HTTP implementation of the cluster gateway port against the Pinot
//! controller REST API.

pub mod http;

pub use http::HttpClusterGateway;
