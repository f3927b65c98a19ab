//! Scan Controller Configuration
//!
//! Loaded from a YAML file mounted from a ConfigMap. Every field has a
//! default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main controller configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Namespace to watch. `None` watches every namespace.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Upper bound for a single reconcile, store calls included
    #[serde(rename = "reconcileTimeoutSeconds", default = "default_reconcile_timeout")]
    pub reconcile_timeout_seconds: u64,

    /// Delay before a failed reconcile is retried
    #[serde(rename = "errorRequeueSeconds", default = "default_error_requeue")]
    pub error_requeue_seconds: u64,

    /// Periodic resync after a successful reconcile. 0 waits for changes only.
    #[serde(rename = "resyncSeconds", default)]
    pub resync_seconds: u64,

    /// Health endpoint configuration
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Address the `/health` and `/ready` endpoints listen on
    #[serde(rename = "bindAddress", default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_reconcile_timeout() -> u64 {
    30
}

fn default_error_requeue() -> u64 {
    60
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl ControllerConfig {
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_seconds)
    }

    #[must_use]
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }

    #[must_use]
    pub fn resync(&self) -> Option<Duration> {
        (self.resync_seconds > 0).then(|| Duration::from_secs(self.resync_seconds))
    }

    /// Validate that configuration values are usable
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.reconcile_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "reconcileTimeoutSeconds must be greater than zero"
            ));
        }

        if self.error_requeue_seconds == 0 {
            return Err(anyhow::anyhow!(
                "errorRequeueSeconds must be greater than zero"
            ));
        }

        if let Some(namespace) = &self.namespace {
            if namespace.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "namespace must be omitted or non-empty"
                ));
            }
        }

        self.health
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| {
                anyhow::anyhow!(
                    "health.bindAddress '{}' is not a socket address: {e}",
                    self.health.bind_address
                )
            })?;

        Ok(())
    }

    /// Load configuration from mounted ConfigMap file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, anyhow::Error> {
        // serde_yaml rejects an empty document
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            reconcile_timeout_seconds: default_reconcile_timeout(),
            error_requeue_seconds: default_error_requeue(),
            resync_seconds: 0,
            health: HealthConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
namespace: security
reconcileTimeoutSeconds: 10
errorRequeueSeconds: 15
resyncSeconds: 300
health:
  bindAddress: "127.0.0.1:9090"
"#;

        let config = ControllerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("security"));
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(10));
        assert_eq!(config.error_requeue(), Duration::from_secs(15));
        assert_eq!(config.resync(), Some(Duration::from_secs(300)));
        assert_eq!(config.health.bind_address, "127.0.0.1:9090");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config = ControllerConfig::from_yaml("resyncSeconds: 0\n").unwrap();
        assert!(config.namespace.is_none());
        assert_eq!(config.reconcile_timeout_seconds, 30);
        assert_eq!(config.error_requeue_seconds, 60);
        assert!(config.resync().is_none());
        assert_eq!(config.health.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn empty_document_is_default_config() {
        let config = ControllerConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.reconcile_timeout_seconds, 30);
    }

    #[test]
    fn test_default_config() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = ControllerConfig::default();
        config.reconcile_timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.error_requeue_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_bind_address() {
        let mut config = ControllerConfig::default();
        config.health.bind_address = "not-an-address".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health.bindAddress"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ControllerConfig::from_mounted_file("/nonexistent/config.yaml").is_err());
    }
}
