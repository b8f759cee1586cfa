//! Error types for the storage crate

use ganadero_core::GanaderoError;
use thiserror::Error;

/// Type alias for Results using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error type for key-value backend operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage is full
    #[error("Storage is full")]
    StorageFull,

    /// Invalid key format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Backend(_))
    }

    /// Check if the error is due to storage being full
    pub fn is_storage_full(&self) -> bool {
        matches!(self, StorageError::StorageFull)
    }
}

/// Result alias for cache partition operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Cache partition errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying key-value store failed
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),

    /// Partition name cannot be used as a storage prefix
    #[error("Invalid partition name: {0}")]
    InvalidName(String),

    /// A stored response could not be decoded
    #[error("Corrupt cache entry for {key}: {reason}")]
    Corruption {
        /// Cache key of the damaged entry
        key: String,
        /// What went wrong
        reason: String,
    },
}

/// Result alias for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Durable queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// The durable store cannot be opened or written (quota, permissions, I/O)
    #[error("Queue storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A stored row could not be decoded
    #[error("Corrupt queue entry {id}: {reason}")]
    Corrupt {
        /// Id of the damaged entry
        id: u64,
        /// What went wrong
        reason: String,
    },

    /// No live queue entry has this id
    #[error("Queue entry {0} not found")]
    NotFound(u64),

    /// The operation could not be serialized for storage
    #[error("Invalid queued operation: {0}")]
    InvalidOperation(String),
}

impl QueueError {
    /// Storage outages are worth retrying on the next sync trigger
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::StorageUnavailable(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        QueueError::StorageUnavailable(err.to_string())
    }
}

impl From<StorageError> for GanaderoError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Config(msg) => GanaderoError::Configuration(msg),
            StorageError::InvalidKey(key) => GanaderoError::InvalidInput(format!("Invalid key: {key}")),
            StorageError::Serialization(msg) | StorageError::Deserialization(msg) => {
                GanaderoError::Serialization(msg)
            }
            other => GanaderoError::Storage(other.to_string()),
        }
    }
}

impl From<CacheError> for GanaderoError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Storage(inner) => inner.into(),
            CacheError::InvalidName(name) => GanaderoError::InvalidInput(format!("Invalid partition name: {name}")),
            corrupt @ CacheError::Corruption { .. } => GanaderoError::Serialization(corrupt.to_string()),
        }
    }
}

impl From<QueueError> for GanaderoError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::StorageUnavailable(msg) => GanaderoError::Storage(msg),
            QueueError::InvalidOperation(msg) => GanaderoError::InvalidInput(msg),
            QueueError::NotFound(id) => GanaderoError::NotFound(format!("queue entry {id}")),
            corrupt @ QueueError::Corrupt { .. } => GanaderoError::Serialization(corrupt.to_string()),
        }
    }
}
