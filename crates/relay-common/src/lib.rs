//! # Relay Common
//!
//! Shared error type, logging setup and host configuration for the Relay
//! service worker host.
//!
//! ## Features
//!
//! - Unified error type with category names
//! - Logging configuration and setup
//! - JSON host configuration with defaults

use thiserror::Error;

pub mod config;
pub mod logging;

pub use config::{HostConfig, LoggingConfig, NetworkConfig};
pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for Relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Worker lifecycle errors.
    #[error("Lifecycle error: {message}")]
    Lifecycle {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a lifecycle error with source.
    pub fn lifecycle_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Lifecycle {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error category for logs and reports.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::Network { .. } => "network",
            RelayError::Lifecycle { .. } => "lifecycle",
            RelayError::Config { .. } => "config",
            RelayError::Io(_) => "io",
        }
    }
}

/// Result type alias for Relay operations.
pub type RelayResult<T> = std::result::Result<T, RelayError>;
