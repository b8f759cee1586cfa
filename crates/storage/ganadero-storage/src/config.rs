//! Configuration structures for cache backends and queue engines

use crate::backends::{FileStorage, MemoryStorage};
use crate::error::{QueueResult, Result, StorageError};
use crate::queue::{InMemoryQueueStore, QueueStore};
use crate::traits::Storage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared handle to a key-value backend
pub type SharedStorage = Arc<dyn Storage<Error = StorageError>>;

/// Shared handle to a queue engine
pub type SharedQueue = Arc<dyn QueueStore>;

/// Key-value backend selection for the cache partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// In-memory storage
    Memory(MemoryConfig),

    /// Single JSON file on disk
    File(FileConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory(MemoryConfig::default())
    }
}

/// Configuration for in-memory storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum memory usage in bytes (0 = unlimited)
    #[serde(default)]
    pub max_memory_bytes: usize,
}

/// Configuration for file storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Path to the backing JSON file
    pub path: PathBuf,
}

/// Queue engine selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueConfig {
    /// Volatile queue, lost on restart
    Memory,

    /// SQLite database file
    Sqlite(SqliteQueueConfig),
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Configuration for the SQLite queue engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteQueueConfig {
    /// Path to the database file
    pub path: PathBuf,

    /// Use write-ahead logging
    #[serde(default = "default_true")]
    pub wal: bool,
}

fn default_true() -> bool {
    true
}

/// Build the key-value backend described by `config`
pub fn open_storage(config: &StorageConfig) -> Result<SharedStorage> {
    match config {
        StorageConfig::Memory(memory) => Ok(Arc::new(MemoryStorage::new(memory.clone()))),
        StorageConfig::File(file) => {
            if file.path.as_os_str().is_empty() {
                return Err(StorageError::Config("file storage path is empty".into()));
            }
            Ok(Arc::new(FileStorage::new(&file.path)?))
        }
    }
}

/// Build the queue engine described by `config`. The engine is not opened yet.
pub fn open_queue(config: &QueueConfig) -> QueueResult<SharedQueue> {
    match config {
        QueueConfig::Memory => Ok(Arc::new(InMemoryQueueStore::new())),
        #[cfg(feature = "sqlite")]
        QueueConfig::Sqlite(sqlite) => Ok(Arc::new(crate::queue::SqliteQueueStore::with_config(sqlite.clone()))),
        #[cfg(not(feature = "sqlite"))]
        QueueConfig::Sqlite(_) => Err(crate::error::QueueError::StorageUnavailable(
            "built without the `sqlite` feature".into(),
        )),
    }
}
