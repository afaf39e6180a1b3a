//! Host configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::LogFormat;
use crate::{RelayError, RelayResult};

/// Worker host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Outbound network settings
    pub network: NetworkConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User agent string
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum redirects followed by the client
    pub max_redirects: usize,

    /// Keep a cookie jar
    pub cookies_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name (error, warn, info, debug, trace)
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Include source file and line
    pub include_location: bool,

    /// `EnvFilter` directives, overrides `level`
    pub filter: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Relay/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            max_redirects: 10,
            cookies_enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
            filter: None,
        }
    }
}

impl HostConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> RelayResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RelayError::config_with_source("invalid host config", e))
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded host config");
        Ok(config)
    }

    /// Reject settings the network client cannot honor.
    pub fn validate(&self) -> RelayResult<()> {
        if self.network.timeout_secs == 0 {
            return Err(RelayError::config("network.timeout_secs must be positive"));
        }
        if self.network.user_agent.trim().is_empty() {
            return Err(RelayError::config("network.user_agent must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.network.max_redirects, 10);
        assert!(config.network.user_agent.starts_with("Relay/"));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HostConfig::from_json(r#"{"network": {"timeout_secs": 5}}"#).unwrap();
        assert_eq!(config.network.timeout_secs, 5);
        assert_eq!(config.network.max_redirects, 10);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_log_format_names() {
        let config = HostConfig::from_json(r#"{"logging": {"format": "json"}}"#).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_json() {
        let err = HostConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"network": {{"timeout_secs": 0}}}}"#).unwrap();

        let err = HostConfig::load(file.path()).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_load_missing_file() {
        let err = HostConfig::load("/nonexistent/relay.json").unwrap_err();
        assert_eq!(err.category(), "io");
    }
}
