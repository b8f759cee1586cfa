//! Named cache partitions over a key-value backend
//!
//! A partition is a marker key `partitions/{name}` plus entries under
//! `entries/{name}/{METHOD} {url}`. Partitions are independent: deleting one
//! never touches another, and entries are never evicted.

mod entry;

pub use entry::{request_key, StoredResponse};

use crate::config::SharedStorage;
use crate::error::{CacheError, CacheResult};
use ganadero_core::{Request, Response};
use tracing::{debug, warn};

const PARTITION_PREFIX: &str = "partitions/";
const ENTRY_PREFIX: &str = "entries/";

/// Registry of named partitions
#[derive(Clone)]
pub struct CacheStorage {
    backend: SharedStorage,
}

impl CacheStorage {
    /// Wrap a key-value backend
    pub fn new(backend: SharedStorage) -> Self {
        Self { backend }
    }

    /// Open the named partition, creating it if absent
    pub async fn open(&self, name: &str) -> CacheResult<CachePartition> {
        validate_name(name)?;
        let marker = marker_key(name);
        if !self.backend.exists(marker.as_bytes()).await? {
            self.backend.put(marker.as_bytes(), b"").await?;
            debug!(partition = name, "Created cache partition");
        }
        Ok(CachePartition {
            name: name.to_owned(),
            backend: self.backend.clone(),
        })
    }

    /// Handle to the named partition without creating it.
    ///
    /// Entries written through a handle whose partition does not exist are
    /// invisible to [`CacheStorage::keys`] and are not removed by
    /// [`CacheStorage::delete`]; call [`CacheStorage::open`] first.
    pub fn partition(&self, name: &str) -> CacheResult<CachePartition> {
        validate_name(name)?;
        Ok(CachePartition {
            name: name.to_owned(),
            backend: self.backend.clone(),
        })
    }

    /// Whether a partition with this name exists
    pub async fn has(&self, name: &str) -> CacheResult<bool> {
        validate_name(name)?;
        Ok(self.backend.exists(marker_key(name).as_bytes()).await?)
    }

    /// Delete a partition and every entry in it. Returns `false` if it did not exist.
    pub async fn delete(&self, name: &str) -> CacheResult<bool> {
        validate_name(name)?;
        let marker = marker_key(name);
        if !self.backend.exists(marker.as_bytes()).await? {
            return Ok(false);
        }

        let prefix = entry_prefix(name);
        let mut keys = self.backend.list(prefix.as_bytes()).await?;
        let entries = keys.len();
        keys.push(marker.into_bytes());
        self.backend.delete_batch(&keys).await?;
        debug!(partition = name, entries, "Deleted cache partition");
        Ok(true)
    }

    /// Names of all existing partitions, sorted
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let raw = self.backend.list(PARTITION_PREFIX.as_bytes()).await?;
        Ok(raw
            .into_iter()
            .filter_map(|key| {
                let key = String::from_utf8(key).ok()?;
                key.strip_prefix(PARTITION_PREFIX).map(str::to_owned)
            })
            .collect())
    }

    /// Persist any buffered writes
    pub async fn flush(&self) -> CacheResult<()> {
        Ok(self.backend.flush().await?)
    }
}

/// Handle to one named partition
#[derive(Clone)]
pub struct CachePartition {
    name: String,
    backend: SharedStorage,
}

impl std::fmt::Debug for CachePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePartition").field("name", &self.name).finish()
    }
}

impl CachePartition {
    /// Partition name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for `request`
    pub async fn match_request(&self, request: &Request) -> CacheResult<Option<Response>> {
        let key = self.entry_key(request);
        let Some(raw) = self.backend.get(key.as_bytes()).await? else {
            return Ok(None);
        };

        let stored: StoredResponse = serde_json::from_slice(&raw).map_err(|e| {
            warn!(partition = %self.name, key = %key, error = %e, "Undecodable cache entry");
            CacheError::Corruption {
                key: request_key(request),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(stored.into_response()))
    }

    /// Store `response` for `request`, replacing any previous entry
    pub async fn put(&self, request: &Request, response: &Response) -> CacheResult<()> {
        let stored = StoredResponse::capture(response);
        let value = serde_json::to_vec(&stored).map_err(|e| CacheError::Corruption {
            key: request_key(request),
            reason: e.to_string(),
        })?;
        self.backend.put(self.entry_key(request).as_bytes(), &value).await?;
        Ok(())
    }

    /// Remove the entry for `request`. Returns `false` if there was none.
    pub async fn delete(&self, request: &Request) -> CacheResult<bool> {
        let key = self.entry_key(request);
        if !self.backend.exists(key.as_bytes()).await? {
            return Ok(false);
        }
        self.backend.delete(key.as_bytes()).await?;
        Ok(true)
    }

    /// Request keys (`METHOD url`) of every entry, sorted
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let prefix = entry_prefix(&self.name);
        let raw = self.backend.list(prefix.as_bytes()).await?;
        Ok(raw
            .into_iter()
            .filter_map(|key| {
                let key = String::from_utf8(key).ok()?;
                key.strip_prefix(&prefix).map(str::to_owned)
            })
            .collect())
    }

    /// Number of entries
    pub async fn len(&self) -> CacheResult<usize> {
        Ok(self.backend.list(entry_prefix(&self.name).as_bytes()).await?.len())
    }

    /// `true` if the partition holds no entries
    pub async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    fn entry_key(&self, request: &Request) -> String {
        format!("{}{}", entry_prefix(&self.name), request_key(request))
    }
}

fn validate_name(name: &str) -> CacheResult<()> {
    if name.is_empty() || name.contains('/') {
        return Err(CacheError::InvalidName(name.to_owned()));
    }
    Ok(())
}

fn marker_key(name: &str) -> String {
    format!("{PARTITION_PREFIX}{name}")
}

fn entry_prefix(name: &str) -> String {
    format!("{ENTRY_PREFIX}{name}/")
}
