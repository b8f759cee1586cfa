//! Error handling types shared across the Ganadero crates.
//!
//! Every crate keeps its own error enum for the failures it can describe
//! precisely and converts into [`GanaderoError`] at crate boundaries.

use std::fmt;
use thiserror::Error;

/// The main error type for the offline worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GanaderoError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network related errors
    #[error("Network error: {0}")]
    Network(String),

    /// Storage/persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GanaderoError {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new network error
    pub fn network<T: fmt::Display>(msg: T) -> Self {
        Self::Network(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a new internal error
    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Storage(_))
    }

    /// Check if this error was caused by the caller
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::NotFound(_))
    }
}

/// Result type alias for Ganadero operations
pub type GanaderoResult<T> = Result<T, GanaderoError>;

impl From<std::io::Error> for GanaderoError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GanaderoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for GanaderoError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for GanaderoError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GanaderoError::config("missing api base");
        assert_eq!(err, GanaderoError::Configuration("missing api base".to_string()));
        assert_eq!(err.to_string(), "Configuration error: missing api base");
    }

    #[test]
    fn test_error_classification() {
        let client_err = GanaderoError::invalid_input("bad method");
        assert!(client_err.is_client_error());
        assert!(!client_err.is_retryable());

        let storage_err = GanaderoError::storage("database locked");
        assert!(storage_err.is_retryable());
        assert!(!storage_err.is_client_error());

        assert!(GanaderoError::network("connection refused").is_retryable());
    }

    #[test]
    fn test_error_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GanaderoError = json_err.into();
        assert!(matches!(err, GanaderoError::Serialization(_)));
    }
}
