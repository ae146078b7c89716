//! TOML configuration parsing for the aggregation pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolbusConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Lifecycle settings
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Health monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Registration logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum number of audit records retained in memory
    #[serde(default = "default_audit_history_max")]
    pub audit_history_max: usize,
}

fn default_audit_history_max() -> usize {
    crate::registry::AUDIT_HISTORY_MAX_DEFAULT
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            audit_history_max: default_audit_history_max(),
        }
    }
}

/// Lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Grace period before a deprecated or unregistered tool is removed (milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_grace_period_ms() -> u64 {
    crate::lifecycle::GRACE_PERIOD_DEFAULT.as_millis() as u64
}

impl LifecycleConfig {
    /// Grace period as a [`Duration`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Timeout for a single source query (milliseconds)
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
}

fn default_source_timeout_ms() -> u64 {
    crate::discovery::SOURCE_TIMEOUT_DEFAULT.as_millis() as u64
}

impl DiscoveryConfig {
    /// Source timeout as a [`Duration`].
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout_ms(),
        }
    }
}

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between health checks (milliseconds)
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Maximum number of health check results retained
    #[serde(default = "default_history_max")]
    pub history_max: usize,
}

fn default_check_interval_ms() -> u64 {
    crate::monitor::CHECK_INTERVAL_DEFAULT.as_millis() as u64
}

fn default_history_max() -> usize {
    crate::monitor::HISTORY_MAX_DEFAULT
}

impl MonitorConfig {
    /// Check interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            history_max: default_history_max(),
        }
    }
}

/// Registration logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Optional JSONL file for registration records. In-memory only when unset.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl ToolbusConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolbusConfig::default();
        assert_eq!(config.registry.audit_history_max, 10_000);
        assert_eq!(config.lifecycle.grace_period_ms, 5_000);
        assert_eq!(config.discovery.source_timeout_ms, 30_000);
        assert_eq!(config.monitor.check_interval_ms, 5_000);
        assert_eq!(config.monitor.history_max, 1_000);
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        use tempfile::NamedTempFile;

        let toml_content = r#"
[registry]
audit_history_max = 500

[lifecycle]
grace_period_ms = 250

[discovery]
source_timeout_ms = 1000

[monitor]
check_interval_ms = 2000
history_max = 50

[logging]
log_file = "/tmp/registrations.jsonl"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = ToolbusConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.registry.audit_history_max, 500);
        assert_eq!(config.lifecycle.grace_period(), Duration::from_millis(250));
        assert_eq!(config.discovery.source_timeout(), Duration::from_secs(1));
        assert_eq!(config.monitor.check_interval(), Duration::from_secs(2));
        assert_eq!(config.monitor.history_max, 50);
        assert_eq!(
            config.logging.log_file.as_deref(),
            Some("/tmp/registrations.jsonl")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        use tempfile::NamedTempFile;

        let toml_content = r#"
[lifecycle]
grace_period_ms = 100
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = ToolbusConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.lifecycle.grace_period_ms, 100);
        assert_eq!(config.registry.audit_history_max, 10_000);
        assert_eq!(config.monitor.history_max, 1_000);
    }
}
