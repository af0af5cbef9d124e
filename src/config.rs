//! Operator configuration
//!
//! `EngineConfig` carries the timing and identity settings of the
//! reconciliation engine. Defaults can be overridden by an optional YAML
//! file, which command-line flags override in turn.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default field manager for server-side apply
pub const DEFAULT_FIELD_MANAGER: &str = "pinot-operator";

// =============================================================================
// Engine Configuration
// =============================================================================

/// Configuration for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Interval between reconciliation passes, in seconds
    pub reconcile_interval_secs: u64,
    /// Fixed delay before a closed watch is reopened, in seconds
    pub watch_retry_delay_secs: u64,
    /// Upper bound for a single gateway call, in seconds
    pub gateway_timeout_secs: u64,
    /// Field manager used for server-side apply
    pub field_manager: String,
    /// Restrict watches to one namespace; all namespaces when unset
    pub namespace: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 30,
            watch_retry_delay_secs: 5,
            gateway_timeout_secs: 30,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            namespace: None,
        }
    }
}

impl EngineConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn watch_retry_delay(&self) -> Duration {
        Duration::from_secs(self.watch_retry_delay_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Load from a YAML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.reconcile_interval_secs == 0 {
            return Err(Error::Configuration(
                "reconcileIntervalSecs must be greater than zero".into(),
            ));
        }
        if self.gateway_timeout_secs == 0 {
            return Err(Error::Configuration(
                "gatewayTimeoutSecs must be greater than zero".into(),
            ));
        }
        if self.field_manager.trim().is_empty() {
            return Err(Error::Configuration("fieldManager must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.reconcile_interval(), Duration::from_secs(30));
        assert_eq!(config.watch_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.gateway_timeout(), Duration::from_secs(30));
        assert_eq!(config.field_manager, "pinot-operator");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reconcileIntervalSecs: 60").unwrap();
        writeln!(file, "namespace: analytics").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.reconcile_interval_secs, 60);
        assert_eq!(config.namespace.as_deref(), Some("analytics"));
        assert_eq!(config.watch_retry_delay_secs, 5);
    }

    #[test]
    fn test_from_file_rejects_zero_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reconcileIntervalSecs: 0").unwrap();

        assert_matches!(
            EngineConfig::from_file(file.path()),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_from_file_missing() {
        assert_matches!(
            EngineConfig::from_file("/nonexistent/pinot-operator.yaml"),
            Err(Error::Io(_))
        );
    }
}
