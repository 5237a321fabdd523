//! Configuration for error reporting
//!
//! Loaded from JSON; every field has a default so a partial document is
//! valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::error::{DEFAULT_LOG_SOURCE, DEFAULT_MESSAGE_LIMIT};

/// Smallest accepted message limit, in bytes.
pub const MIN_MESSAGE_LIMIT: usize = 16;

/// Settings shared by every thread's error context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Source tag attached to error log records
    pub log_source: String,

    /// Upper bound on stored error messages, in bytes
    pub message_limit: usize,

    /// Log a formatted traceback for foreign exceptions
    pub log_tracebacks: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_source: DEFAULT_LOG_SOURCE.to_string(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            log_tracebacks: true,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Message limit below [`MIN_MESSAGE_LIMIT`]
    #[error("message limit {0} is below the minimum of 16 bytes")]
    MessageLimitTooSmall(usize),

    /// Blank log source
    #[error("log source must not be empty")]
    EmptyLogSource,
}

impl CoreConfig {
    /// Check value ranges.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.log_source.trim().is_empty() {
            return Err(ConfigError::EmptyLogSource);
        }
        if self.message_limit < MIN_MESSAGE_LIMIT {
            return Err(ConfigError::MessageLimitTooSmall(self.message_limit));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: CoreConfig =
            serde_json::from_str(text).context("Failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Write the config as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = CoreConfig::from_json_str(r#"{"log_source": "AGENT"}"#).unwrap();
        assert_eq!(config.log_source, "AGENT");
        assert_eq!(config.message_limit, DEFAULT_MESSAGE_LIMIT);
        assert!(config.log_tracebacks);
    }

    #[test]
    fn test_rejects_tiny_limit() {
        let err = CoreConfig::from_json_str(r#"{"message_limit": 4}"#).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MessageLimitTooSmall(4))
        );
    }

    #[test]
    fn test_rejects_blank_source() {
        let config = CoreConfig {
            log_source: "  ".to_string(),
            ..CoreConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyLogSource));
    }

    #[test]
    fn test_write_and_load_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mgmt.json");

        let config = CoreConfig {
            log_source: "MGMT".to_string(),
            message_limit: 512,
            log_tracebacks: false,
        };
        config.write(&path).unwrap();

        let loaded = CoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(CoreConfig::load(&temp.path().join("absent.json")).is_err());
    }
}
