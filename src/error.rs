//! Error types for the Pinot Operator
//!
//! Provides the structured error taxonomy shared by the watch loops, the
//! apply planner, the gateway and the status reporter.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Configuration error for node {node}: {reason}")]
    NodeConfiguration { node: String, reason: String },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Platform operation failed: {operation} {object}: {reason}")]
    PlatformOperation {
        object: String,
        operation: String,
        reason: String,
    },

    // =========================================================================
    // Watch Errors
    // =========================================================================
    #[error("Watch disrupted for {kind}: {reason}")]
    WatchDisrupted { kind: String, reason: String },

    // =========================================================================
    // Status Errors
    // =========================================================================
    #[error("Status write conflict for {kind} {key}")]
    StatusWriteConflict { kind: String, key: String },

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    #[error("Gateway unavailable for cluster {cluster}: {reason}")]
    GatewayUnavailable { cluster: String, reason: String },

    #[error("Gateway call {operation} timed out for cluster {cluster} after {timeout:?}")]
    GatewayTimeout {
        cluster: String,
        operation: String,
        timeout: Duration,
    },

    #[error("Gateway HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take when an error surfaces from a resource's processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Leave it to the next reconciliation pass
    RetryNextCycle,
    /// Reconnect the watch after the configured delay and relist
    Resync,
    /// Drop the write, a later pass supersedes it
    Drop,
    /// Don't retry, wait for the resource to change
    NoRetry,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            Error::Configuration(_) | Error::NodeConfiguration { .. } => ErrorAction::NoRetry,

            Error::WatchDisrupted { .. } => ErrorAction::Resync,

            Error::StatusWriteConflict { .. } => ErrorAction::Drop,

            _ => ErrorAction::RetryNextCycle,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRetry)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::GatewayUnavailable { .. }
                | Error::GatewayTimeout { .. }
                | Error::Http(_)
                | Error::Kube(_)
        )
    }

    /// Machine-readable reason written to resource status
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Configuration(_) | Error::NodeConfiguration { .. } => "ConfigurationError",
            Error::GatewayUnavailable { .. } | Error::GatewayTimeout { .. } | Error::Http(_) => {
                "GatewayUnavailable"
            }
            Error::Kube(_) | Error::PlatformOperation { .. } => "PlatformError",
            Error::StatusWriteConflict { .. } => "Conflict",
            _ => "InternalError",
        }
    }

    /// Whether a kube error is an optimistic-concurrency conflict
    pub fn is_conflict(err: &kube::Error) -> bool {
        matches!(err, kube::Error::Api(ae) if ae.code == 409)
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::Configuration("deploymentOrder is empty".into());
        assert_eq!(err.action(), ErrorAction::NoRetry);

        let err = Error::WatchDisrupted {
            kind: "cluster".into(),
            reason: "stream closed".into(),
        };
        assert_eq!(err.action(), ErrorAction::Resync);
        assert!(err.is_retryable());

        let err = Error::StatusWriteConflict {
            kind: "table".into(),
            key: "default/events".into(),
        };
        assert_eq!(err.action(), ErrorAction::Drop);

        let err = Error::GatewayUnavailable {
            cluster: "c1".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.action(), ErrorAction::RetryNextCycle);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::GatewayTimeout {
            cluster: "c1".into(),
            operation: "push_schema".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let config_err = Error::NodeConfiguration {
            node: "n1".into(),
            reason: "workload template tmplX not found".into(),
        };
        assert!(!config_err.is_retryable());
        assert!(!config_err.is_transient());
    }

    #[test]
    fn test_error_reason() {
        assert_eq!(
            Error::Configuration("bad".into()).reason(),
            "ConfigurationError"
        );
        assert_eq!(
            Error::GatewayUnavailable {
                cluster: "c1".into(),
                reason: "refused".into()
            }
            .reason(),
            "GatewayUnavailable"
        );
        assert_eq!(Error::Internal("boom".into()).reason(), "InternalError");
    }
}
