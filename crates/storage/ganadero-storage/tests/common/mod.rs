//! Common test fixtures for ganadero-storage
#![allow(dead_code)]

use ganadero_core::Method;
use ganadero_storage::backends::{FileStorage, MemoryStorage};
use ganadero_storage::{CacheStorage, InMemoryQueueStore, NewOperation, SharedQueue};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// A queue engine plus whatever keeps its backing files alive
pub struct QueueTestFixture {
    _temp_dir: Option<TempDir>,
    pub queue: SharedQueue,
}

impl QueueTestFixture {
    pub async fn new_memory() -> Self {
        let queue: SharedQueue = Arc::new(InMemoryQueueStore::new());
        queue.open().await.expect("Failed to open memory queue");
        Self { _temp_dir: None, queue }
    }

    #[cfg(feature = "sqlite")]
    pub async fn new_sqlite() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let queue: SharedQueue = Arc::new(ganadero_storage::SqliteQueueStore::new(temp_dir.path().join("queue.db")));
        queue.open().await.expect("Failed to open sqlite queue");
        Self {
            _temp_dir: Some(temp_dir),
            queue,
        }
    }
}

/// A cache registry plus whatever keeps its backing files alive
pub struct CacheTestFixture {
    _temp_dir: Option<TempDir>,
    pub cache: CacheStorage,
}

impl CacheTestFixture {
    pub async fn new_memory() -> Self {
        Self {
            _temp_dir: None,
            cache: CacheStorage::new(Arc::new(MemoryStorage::default())),
        }
    }

    pub async fn new_file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = FileStorage::new(temp_dir.path().join("cache.json")).expect("Failed to open file storage");
        Self {
            _temp_dir: Some(temp_dir),
            cache: CacheStorage::new(Arc::new(storage)),
        }
    }
}

/// A `POST` creating an animal with the given ear tag
pub fn create_animal(tag: &str) -> NewOperation {
    NewOperation::new(Method::Post, "/api/v1/animales")
        .expect("POST is queueable")
        .with_header("Content-Type", "application/json")
        .with_data(json!({ "arete": tag }))
}

/// Macro for running a queue test against every engine
#[macro_export]
macro_rules! test_all_queues {
    ($test_name:ident, $test_fn:expr) => {
        mod $test_name {
            use super::*;

            #[tokio::test]
            async fn memory() {
                let fixture = $crate::common::QueueTestFixture::new_memory().await;
                $test_fn(fixture).await;
            }

            #[cfg(feature = "sqlite")]
            #[tokio::test]
            async fn sqlite() {
                let fixture = $crate::common::QueueTestFixture::new_sqlite().await;
                $test_fn(fixture).await;
            }
        }
    };
}

/// Macro for running a cache test against every key-value backend
#[macro_export]
macro_rules! test_all_caches {
    ($test_name:ident, $test_fn:expr) => {
        mod $test_name {
            use super::*;

            #[tokio::test]
            async fn memory() {
                let fixture = $crate::common::CacheTestFixture::new_memory().await;
                $test_fn(fixture).await;
            }

            #[tokio::test]
            async fn file() {
                let fixture = $crate::common::CacheTestFixture::new_file().await;
                $test_fn(fixture).await;
            }
        }
    };
}
