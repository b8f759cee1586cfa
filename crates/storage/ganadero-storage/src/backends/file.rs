//! File-based storage backend: the whole map in one JSON document
//!
//! Keys are hex encoded. Values that are valid UTF-8 are stored as
//! `{"utf8": "..."}`, anything else as a plain hex string. Every mutation
//! rewrites the document through a temporary file and an atomic rename, so a
//! crash leaves either the old or the new snapshot on disk, never a torn one.

use crate::error::{Result, StorageError};
use crate::traits::Storage;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// One value in the on-disk document
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Text { utf8: String },
    Hex(String),
}

impl StoredValue {
    fn encode(value: &[u8]) -> Self {
        match std::str::from_utf8(value) {
            Ok(text) => StoredValue::Text { utf8: text.to_owned() },
            Err(_) => StoredValue::Hex(hex::encode(value)),
        }
    }

    fn decode(self) -> Result<Vec<u8>> {
        match self {
            StoredValue::Text { utf8 } => Ok(utf8.into_bytes()),
            StoredValue::Hex(raw) => hex::decode(raw).map_err(|e| StorageError::Deserialization(e.to_string())),
        }
    }
}

/// Simple file-based storage using a single JSON file
#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    // Serializes mutate-then-save so snapshots reach disk in order
    save_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Open (or create) file storage at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut data = BTreeMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if !content.trim().is_empty() {
                let map: HashMap<String, StoredValue> = serde_json::from_str(&content)
                    .map_err(|e| StorageError::Deserialization(e.to_string()))?;
                for (k, v) in map {
                    let key = hex::decode(&k).map_err(|e| StorageError::Deserialization(e.to_string()))?;
                    data.insert(key, v.decode()?);
                }
            }
            debug!(path = %path.display(), keys = data.len(), "Loaded file storage");
        }

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
            save_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<String> {
        let data = self.data.read();
        let map: BTreeMap<String, StoredValue> = data
            .iter()
            .map(|(k, v)| (hex::encode(k), StoredValue::encode(v)))
            .collect();
        serde_json::to_string_pretty(&map).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn write_snapshot(&self, json: String) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    type Error = StorageError;

    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.data.read().get(key).map(|v| Bytes::copy_from_slice(v)))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        self.data.write().insert(key.to_vec(), value.to_vec());
        let json = self.snapshot()?;
        self.write_snapshot(json).await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        if self.data.write().remove(key).is_none() {
            return Ok(());
        }
        let json = self.snapshot()?;
        self.write_snapshot(json).await
    }

    async fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let removed = {
            let mut data = self.data.write();
            keys.iter().filter(|key| data.remove(key.as_slice()).is_some()).count()
        };
        if removed == 0 {
            return Ok(());
        }
        debug!(removed, "Batch delete from file storage");
        let json = self.snapshot()?;
        self.write_snapshot(json).await
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

    async fn flush(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let json = self.snapshot()?;
        self.write_snapshot(json).await
    }
}
