//! Engine configuration loaded from YAML

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Whole-graph cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 64,
            ttl_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Namespace hosting the mesh control plane and gateways
    pub istio_namespace: String,
    pub app_label: String,
    pub version_label: String,
    /// Cluster name used when telemetry carries none
    pub default_cluster: String,
    pub response_time_quantile: f64,
    /// Deadline for one whole build
    pub build_timeout_secs: u64,
    pub cache: CacheConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            istio_namespace: "istio-system".to_string(),
            app_label: "app".to_string(),
            version_label: "version".to_string(),
            default_cluster: "unknown".to_string(),
            response_time_quantile: 0.95,
            build_timeout_secs: 30,
            cache: CacheConfig::default(),
        }
    }
}

impl GraphConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.istio_namespace.is_empty() {
            return Err(ConfigError::Invalid("istio_namespace must not be empty".into()));
        }
        if !(0.0..1.0).contains(&self.response_time_quantile) {
            return Err(ConfigError::Invalid(format!(
                "response_time_quantile {} outside [0, 1)",
                self.response_time_quantile
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = GraphConfig::from_yaml_str("istio_namespace: mesh-system\n").unwrap();
        assert_eq!(config.istio_namespace, "mesh-system");
        assert_eq!(config.app_label, "app");
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn rejects_out_of_range_quantile() {
        let err = GraphConfig::from_yaml_str("response_time_quantile: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  enabled: false\n  capacity: 8").unwrap();
        let config = GraphConfig::load(file.path()).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.cache.ttl_secs, 60);
    }
}
