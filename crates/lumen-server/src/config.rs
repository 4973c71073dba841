//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files including bind address, the remote source
//! and the per-session engine settings.

use crate::registry::DEFAULT_IDLE_TIMEOUT;
use lumen_engine::EngineConfig;
use lumen_source::worldbank::{DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Parsed but unusable value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Remote indicator source settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the indicators API
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after a failed request
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SourceConfig {
    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Server configuration loaded from TOML
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// Seconds a session may go unused before it is ended
    pub session_idle_secs: u64,

    /// Remote source
    pub source: SourceConfig,

    /// Settings applied to every session
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            session_idle_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            source: SourceConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("source.endpoint must not be empty".to_string()));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "source.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.session_idle_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_idle_secs must be greater than zero".to_string(),
            ));
        }
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Session idle timeout as Duration
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// How often idle sessions are swept: a quarter of the idle timeout,
    /// at most once a minute
    pub fn session_sweep_interval(&self) -> Duration {
        (self.session_idle_timeout() / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.source.endpoint, "https://api.worldbank.org");
        assert_eq!(config.engine.refresh_interval_secs, 60);
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(1800));
        assert_eq!(config.session_sweep_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            session_idle_secs = 120

            [source]
            endpoint = "http://localhost:8089"
            max_retries = 1

            [engine]
            refresh_interval_secs = 5
            entity_exclusions = ["XKX"]
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.session_sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.source.endpoint, "http://localhost:8089");
        assert_eq!(config.source.max_retries, 1);
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.engine.refresh_interval_secs, 5);
        assert_eq!(config.engine.entity_exclusions, vec!["XKX"]);
        assert_eq!(config.engine.max_year, 2020);
    }

    #[test]
    fn test_invalid_engine_section_rejected() {
        let toml = r#"
            [engine]
            min_year = 2020
            max_year = 2004
        "#;

        assert!(matches!(ServerConfig::from_toml(toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r#"
            [source]
            timeout_secs = 0
        "#;

        assert!(matches!(ServerConfig::from_toml(toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        assert!(matches!(
            ServerConfig::from_toml("session_idle_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_port = 9100").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_port, 9100);
    }

    #[test]
    fn test_missing_file() {
        let result = ServerConfig::from_file("/nonexistent/lumen.toml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
