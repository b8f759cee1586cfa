//! In-memory storage backend for tests and ephemeral runs

use crate::config::MemoryConfig;
use crate::error::{Result, StorageError};
use crate::traits::{Storage, StorageStats};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory storage implementation
#[derive(Clone, Debug)]
pub struct MemoryStorage {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    stats: Arc<RwLock<StorageStats>>,
    config: MemoryConfig,
}

impl MemoryStorage {
    /// Create a new memory storage instance with config
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            stats: Arc::new(RwLock::new(StorageStats::default())),
            config,
        }
    }

    /// Create a storage that rejects writes beyond `max_memory_bytes`
    pub fn with_limit(max_memory_bytes: usize) -> Self {
        Self::new(MemoryConfig { max_memory_bytes })
    }

    /// Snapshot of the operation counters
    pub fn stats(&self) -> StorageStats {
        self.stats.read().clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Error = StorageError;

    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let data = self.data.read();
        self.stats.write().get_count += 1;
        Ok(data.get(key).map(|v| Bytes::copy_from_slice(v)))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write();
        let mut stats = self.stats.write();

        let old_entry_size = data.get(key).map_or(0, |v| key.len() + v.len());
        let projected_size = stats.size_bytes as usize - old_entry_size + key.len() + value.len();

        // 0 means unlimited
        if self.config.max_memory_bytes > 0 && projected_size > self.config.max_memory_bytes {
            return Err(StorageError::StorageFull);
        }

        if data.insert(key.to_vec(), value.to_vec()).is_none() {
            stats.key_count += 1;
        }
        stats.put_count += 1;
        stats.size_bytes = projected_size as u64;

        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let mut data = self.data.write();
        let mut stats = self.stats.write();

        if let Some(old) = data.remove(key) {
            stats.key_count = stats.key_count.saturating_sub(1);
            stats.delete_count += 1;
            stats.size_bytes = stats.size_bytes.saturating_sub((key.len() + old.len()) as u64);
        }

        Ok(())
    }

    async fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_storage_is_empty() {
        let storage = MemoryStorage::default();
        assert!(storage.get(b"key").await.unwrap().is_none());
        assert!(storage.list(b"").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = MemoryStorage::default();

        storage.put(b"key", b"value").await.unwrap();
        assert_eq!(storage.get(b"key").await.unwrap(), Some(Bytes::from("value")));

        storage.delete(b"key").await.unwrap();
        assert!(!storage.exists(b"key").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_non_existent_key() {
        let storage = MemoryStorage::default();
        storage.delete(b"non-existent").await.unwrap();
        assert_eq!(storage.stats().delete_count, 0);
    }

    #[tokio::test]
    async fn test_list_by_prefix_is_sorted() {
        let storage = MemoryStorage::default();
        storage.put(b"entries/b", b"2").await.unwrap();
        storage.put(b"entries/a", b"1").await.unwrap();
        storage.put(b"partitions/x", b"").await.unwrap();

        let keys = storage.list(b"entries/").await.unwrap();
        assert_eq!(keys, vec![b"entries/a".to_vec(), b"entries/b".to_vec()]);
    }

    #[tokio::test]
    async fn test_memory_limit() {
        let storage = MemoryStorage::with_limit(16);
        storage.put(b"k1", b"12345678").await.unwrap();

        let err = storage.put(b"k2", b"12345678").await.unwrap_err();
        assert!(err.is_storage_full());

        // Overwriting an existing key only counts the difference
        storage.put(b"k1", b"1234567890").await.unwrap();
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let storage1 = MemoryStorage::default();
        let storage2 = storage1.clone();
        storage2.put(b"key", b"value").await.unwrap();
        assert_eq!(storage1.get(b"key").await.unwrap(), Some(Bytes::from("value")));
    }
}
