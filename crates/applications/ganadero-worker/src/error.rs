//! Error types for the worker

use crate::worker::WorkerState;
use ganadero_core::GanaderoError;
use ganadero_net::FetchError;
use ganadero_storage::{CacheError, QueueError};
use thiserror::Error;

/// Result type for worker operations
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

/// Worker errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Invalid or unloadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Install could not cache the manifest; nothing was written
    #[error("Install failed: {} asset(s) unavailable ({})", failures.len(), summarize(failures))]
    Install {
        /// `(asset, reason)` for every asset that failed
        failures: Vec<(String, String)>,
    },

    /// An event arrived in a lifecycle state that cannot handle it
    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        /// What was attempted
        action: &'static str,
        /// State at the time
        state: WorkerState,
    },

    /// Cache partition failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Durable queue failure
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// No response could be obtained
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Shared error from the core crate
    #[error(transparent)]
    Core(#[from] GanaderoError),
}

fn summarize(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(asset, reason)| format!("{asset}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl WorkerError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Install { .. } => true,
            WorkerError::Queue(e) => e.is_retryable(),
            WorkerError::Fetch(e) => e.is_retryable(),
            WorkerError::Cache(CacheError::Storage(e)) => e.is_retryable(),
            WorkerError::Core(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The durable queue could not be reached
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, WorkerError::Queue(QueueError::StorageUnavailable(_)))
    }
}
