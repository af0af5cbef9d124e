//! Kubernetes adapters
//!
//! Concrete implementations of the domain ports on top of the Kubernetes
//! API: the workload platform, the resource sources and the status sink.

pub mod manifests;
pub mod platform;
pub mod source;
pub mod status;

pub use platform::KubePlatform;
pub use source::KubeResourceSource;
pub use status::KubeStatusSink;
