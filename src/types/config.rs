//! Configuration structures.
//!
//! Configuration is loaded from a JSON file; every section falls back to
//! its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{Error, Result};

/// Global runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Message kernel configuration.
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Shutdown behaviour.
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Config {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.kernel.mailbox_capacity == 0 {
            return Err(Error::validation("kernel.mailbox_capacity must be greater than 0"));
        }
        if self.kernel.default_sync_timeout.is_zero() {
            return Err(Error::validation(
                "kernel.default_sync_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Message kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Per-module mailbox capacity. Senders wait when a mailbox is full.
    pub mailbox_capacity: usize,

    /// Timeout modules can fall back to for synchronous calls.
    #[serde(with = "humantime_serde")]
    pub default_sync_timeout: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            default_sync_timeout: Duration::from_secs(30),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for module tasks after cleanup. Zero means do not wait.
    #[serde(with = "humantime_serde")]
    pub module_join_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            module_join_timeout: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.kernel.mailbox_capacity, 1024);
        assert_eq!(config.kernel.default_sync_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown.module_join_timeout, Duration::ZERO);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config =
            Config::from_json_str(r#"{"kernel": {"default_sync_timeout": "2s"}}"#).unwrap();
        assert_eq!(config.kernel.default_sync_timeout, Duration::from_secs(2));
        assert_eq!(config.kernel.mailbox_capacity, 1024);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Config::from_json_str(r#"{"kernel": {"mailbox_capacity": 0}}"#).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"observability": {{"json_logs": true}}, "shutdown": {{"module_join_timeout": "500ms"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.observability.json_logs);
        assert_eq!(config.shutdown.module_join_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/beehive.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
