//! Ganadero Storage - persistence for the offline worker
//!
//! Two concerns live here:
//!
//! - **Cache partitions** ([`cache`]): named, versioned response caches over a
//!   pluggable key-value [`Storage`] backend (memory or a JSON file).
//! - **Durable queue** ([`queue`]): the FIFO log of writes made while offline,
//!   behind the [`QueueStore`] trait with SQLite and in-memory engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use ganadero_storage::prelude::*;
//! use ganadero_core::Method;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = InMemoryQueueStore::new();
//! queue.open().await?;
//! let queued = queue
//!     .enqueue(NewOperation::new(Method::Post, "/api/v1/animales")?.with_data(serde_json::json!({"arete": "MX-001"})))
//!     .await?;
//! assert_eq!(queue.list_all().await?[0].id, queued.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod queue;
pub mod traits;

pub use cache::{CachePartition, CacheStorage, StoredResponse};
pub use config::{open_queue, open_storage, QueueConfig, SharedQueue, SharedStorage, StorageConfig};
pub use error::{CacheError, CacheResult, QueueError, QueueResult, Result, StorageError};
pub use queue::{DeadLetter, InMemoryQueueStore, NewOperation, OperationId, QueueStore, QueuedOperation};
#[cfg(feature = "sqlite")]
pub use queue::SqliteQueueStore;
pub use traits::{Storage, StorageStats};

/// Commonly used imports
pub mod prelude {
    pub use crate::backends::{FileStorage, MemoryStorage};
    pub use crate::cache::{CachePartition, CacheStorage};
    pub use crate::error::{CacheError, QueueError, StorageError};
    pub use crate::queue::{DeadLetter, InMemoryQueueStore, NewOperation, QueueStore, QueuedOperation};
    #[cfg(feature = "sqlite")]
    pub use crate::queue::SqliteQueueStore;
    pub use crate::traits::Storage;
}
