//! Key-value storage abstraction used by the cache partitions

use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error;

/// Core storage trait that all key-value backends implement
#[async_trait]
pub trait Storage: Send + Sync {
    /// Error type for storage operations
    type Error: Error + Send + Sync + 'static;

    /// Get a value by key
    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, Self::Error>;

    /// Store a key-value pair
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &[u8]) -> Result<(), Self::Error>;

    /// Delete several keys. Backends that persist on every mutation override
    /// this to write once.
    async fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<(), Self::Error> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// List all keys starting with `prefix`, in ascending byte order
    async fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, Self::Error>;

    /// Check if a key exists
    async fn exists(&self, key: &[u8]) -> Result<bool, Self::Error> {
        Ok(self.get(key).await?.is_some())
    }

    /// Flush any pending writes
    async fn flush(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Total number of keys
    pub key_count: u64,
    /// Total size of keys and values in bytes
    pub size_bytes: u64,
    /// Number of get operations
    pub get_count: u64,
    /// Number of put operations
    pub put_count: u64,
    /// Number of delete operations
    pub delete_count: u64,
}
