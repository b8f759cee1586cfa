//! Error types for the network boundary

use ganadero_core::GanaderoError;
use std::time::Duration;
use thiserror::Error;

/// Result type for network operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Failure to obtain any HTTP response.
///
/// An HTTP error status is *not* a `FetchError`: a 500 is a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, DNS failure, reset, or the process is offline
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// No response within the deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The URL cannot be resolved to an absolute http(s) URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Whether a later attempt might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::NetworkUnavailable(_) | FetchError::Timeout(_) | FetchError::Body(_))
    }

    /// Whether this means the network could not be reached at all
    pub fn is_offline(&self) -> bool {
        matches!(self, FetchError::NetworkUnavailable(_) | FetchError::Timeout(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured deadline
            FetchError::Timeout(Duration::ZERO)
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<FetchError> for GanaderoError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(_) => GanaderoError::Timeout(err.to_string()),
            FetchError::InvalidUrl(url) => GanaderoError::InvalidInput(format!("Invalid URL: {url}")),
            other => GanaderoError::Network(other.to_string()),
        }
    }
}
