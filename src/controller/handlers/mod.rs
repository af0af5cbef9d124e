//! Per-kind resource handlers
//!
//! A handler turns one resource snapshot into calls against the platform or
//! the cluster gateway and reports the result as an [`ApplyOutcome`]. Errors
//! from a single resource never escape as failures of the engine.

pub mod cluster;
pub mod schema;
pub mod table;
pub mod tenant;

pub use cluster::ClusterHandler;
pub use schema::SchemaHandler;
pub use table::TableHandler;
pub use tenant::TenantHandler;

use crate::crd::ResourcePhase;
use crate::domain::{ClusterGatewayRef, ManagedResource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

// =============================================================================
// Reasons
// =============================================================================

pub const REASON_APPLIED: &str = "Applied";
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_CONFIGURATION_ERROR: &str = "ConfigurationError";
pub const REASON_GATEWAY_REJECTED: &str = "GatewayRejected";
pub const REASON_CLUSTER_UNHEALTHY: &str = "ClusterUnhealthy";

// =============================================================================
// Apply Outcome
// =============================================================================

/// Result of an apply or reconcile attempt, ready to become a status
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub phase: ResourcePhase,
    pub reason: String,
    pub message: String,
    pub reload_status: Option<Vec<String>>,
}

impl ApplyOutcome {
    pub fn ready(reason: &str, message: impl Into<String>) -> Self {
        Self {
            phase: ResourcePhase::Ready,
            reason: reason.to_string(),
            message: message.into(),
            reload_status: None,
        }
    }

    pub fn failed(reason: &str, message: impl Into<String>) -> Self {
        Self {
            phase: ResourcePhase::Failed,
            reason: reason.to_string(),
            message: message.into(),
            reload_status: None,
        }
    }

    /// Failed outcome carrying the error's status reason
    pub fn from_error(err: &Error) -> Self {
        Self::failed(err.reason(), err.to_string())
    }

    pub fn with_reload_status(mut self, statuses: Vec<String>) -> Self {
        self.reload_status = Some(statuses);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ResourcePhase::Ready
    }

    /// Label used for apply metrics
    pub fn metric_label(&self) -> &'static str {
        match self.phase {
            ResourcePhase::Ready => "ready",
            ResourcePhase::Failed => "failed",
        }
    }
}

// =============================================================================
// Resource Handler
// =============================================================================

/// Kind-specific apply, teardown and reconcile logic
#[async_trait]
pub trait ResourceHandler<K: ManagedResource>: Send + Sync {
    /// Make the backing state match the resource
    async fn apply(&self, resource: &K) -> ApplyOutcome;

    /// Remove the backing state of a deleted resource
    async fn teardown(&self, resource: &K) -> Result<()>;

    /// Periodic re-validation; defaults to a full re-apply
    async fn reconcile(&self, resource: &K) -> ApplyOutcome {
        self.apply(resource).await
    }
}

// =============================================================================
// Bounded Gateway Calls
// =============================================================================

/// Gateway handle whose calls are bounded by a timeout
#[derive(Clone)]
pub struct GatewayCalls {
    gateway: ClusterGatewayRef,
    timeout: Duration,
}

impl GatewayCalls {
    pub fn new(gateway: ClusterGatewayRef, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    pub fn gateway(&self) -> &ClusterGatewayRef {
        &self.gateway
    }

    /// Await a gateway call, mapping an elapsed timeout to `GatewayTimeout`
    pub async fn call<T, F>(&self, cluster: &str, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::GatewayTimeout {
                cluster: cluster.to_string(),
                operation: operation.to_string(),
                timeout: self.timeout,
            })?
    }

    /// Map a push result into an outcome
    pub fn push_outcome(result: Result<bool>, what: &str, cluster: &str) -> ApplyOutcome {
        match result {
            Ok(true) => ApplyOutcome::ready(
                REASON_APPLIED,
                format!("{} applied to cluster {}", what, cluster),
            ),
            Ok(false) => ApplyOutcome::failed(
                REASON_GATEWAY_REJECTED,
                format!("Cluster {} rejected the {}", cluster, what.to_lowercase()),
            ),
            Err(e) if e.is_transient() => {
                warn!(
                    "Cluster {} unreachable for {} push, retrying next pass: {}",
                    cluster, what, e
                );
                ApplyOutcome::from_error(&e)
            }
            Err(e) => {
                warn!("Push of {} to cluster {} failed: {}", what, cluster, e);
                ApplyOutcome::from_error(&e)
            }
        }
    }

    /// Downgrade a Ready outcome when the target cluster is unhealthy
    pub async fn with_health(&self, cluster: &str, outcome: ApplyOutcome) -> ApplyOutcome {
        if !outcome.is_ready() {
            return outcome;
        }

        let health = self
            .call(cluster, "check_health", self.gateway.check_health(cluster))
            .await;

        match health {
            Ok(true) => ApplyOutcome {
                reason: REASON_RECONCILED.to_string(),
                ..outcome
            },
            Ok(false) => ApplyOutcome::failed(
                REASON_CLUSTER_UNHEALTHY,
                format!("Cluster {} is not healthy", cluster),
            ),
            Err(e) => ApplyOutcome::from_error(&e),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Require a target cluster name
pub fn validate_cluster_ref(cluster: &str) -> Result<()> {
    if cluster.trim().is_empty() {
        return Err(Error::Configuration("pinotCluster is required".into()));
    }
    Ok(())
}

/// Require a non-empty payload that looks like a JSON object
pub fn validate_payload(field: &str, payload: &str) -> Result<()> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(Error::Configuration(format!("{} is required", field)));
    }
    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return Err(Error::Configuration(format!(
            "{} must be a JSON object",
            field
        )));
    }
    Ok(())
}

/// Require a DNS-1123 label
pub fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');

    if !valid {
        return Err(Error::Configuration(format!(
            "{} '{}' must consist of lowercase alphanumerics or '-', start and end with an alphanumeric, and be at most 63 characters",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClusterGateway;
    use crate::testing::FakeGateway;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload("schema.json", r#" {"schemaName": "events"} "#).is_ok());
        assert_matches!(
            validate_payload("schema.json", ""),
            Err(Error::Configuration(msg)) if msg.contains("required")
        );
        assert_matches!(
            validate_payload("schema.json", "[1, 2]"),
            Err(Error::Configuration(_))
        );
        assert_matches!(
            validate_payload("schema.json", "{\"open\": true"),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_validate_dns_label() {
        assert!(validate_dns_label("name", "pinot-prod-1").is_ok());
        assert!(validate_dns_label("name", "Pinot").is_err());
        assert!(validate_dns_label("name", "-pinot").is_err());
        assert!(validate_dns_label("name", "pinot_1").is_err());
        assert!(validate_dns_label("name", &"a".repeat(64)).is_err());
    }

    #[test]
    fn test_push_outcome() {
        let outcome = GatewayCalls::push_outcome(Ok(true), "Schema", "c1");
        assert!(outcome.is_ready());

        let outcome = GatewayCalls::push_outcome(Ok(false), "Schema", "c1");
        assert_eq!(outcome.reason, REASON_GATEWAY_REJECTED);

        let outcome = GatewayCalls::push_outcome(
            Err(Error::GatewayUnavailable {
                cluster: "c1".into(),
                reason: "refused".into(),
            }),
            "Schema",
            "c1",
        );
        assert_eq!(outcome.reason, "GatewayUnavailable");
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.set_delay(Duration::from_millis(200));
        let calls = GatewayCalls::new(gateway.clone(), Duration::from_millis(20));

        let result = calls
            .call("c1", "check_health", gateway.check_health("c1"))
            .await;
        assert_matches!(result, Err(Error::GatewayTimeout { .. }));
    }

    #[tokio::test]
    async fn test_with_health() {
        let gateway = Arc::new(FakeGateway::new());
        let calls = GatewayCalls::new(gateway.clone(), Duration::from_secs(1));

        gateway.set_healthy("c1", true);
        let outcome = calls
            .with_health("c1", ApplyOutcome::ready(REASON_APPLIED, "ok"))
            .await;
        assert!(outcome.is_ready());
        assert_eq!(outcome.reason, REASON_RECONCILED);

        gateway.set_healthy("c1", false);
        let outcome = calls
            .with_health("c1", ApplyOutcome::ready(REASON_APPLIED, "ok"))
            .await;
        assert_eq!(outcome.reason, REASON_CLUSTER_UNHEALTHY);

        let failed = ApplyOutcome::failed(REASON_CONFIGURATION_ERROR, "bad");
        assert_eq!(calls.with_health("c1", failed.clone()).await, failed);
    }
}
