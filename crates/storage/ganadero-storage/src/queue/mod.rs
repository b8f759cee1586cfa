//! Durable FIFO log of writes that could not reach the network
//!
//! Entries are immutable once enqueued. Replay bookkeeping (attempt counters)
//! lives beside the entry, and the retry policy moves hopeless entries to a
//! separate dead-letter list instead of deleting them.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryQueueStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteQueueStore;

use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ganadero_core::{Headers, Method, Request};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier, strictly increasing in insertion order
pub type OperationId = u64;

/// A write waiting to be enqueued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperation {
    /// `POST`, `PUT`, `PATCH` or `DELETE`
    pub method: Method,
    /// Absolute or relative endpoint
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
    /// JSON body, absent for bodiless requests
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl NewOperation {
    /// Build an operation, rejecting non-mutating methods
    pub fn new(method: Method, url: impl Into<String>) -> QueueResult<Self> {
        if !method.is_mutating() {
            return Err(QueueError::InvalidOperation(format!("{method} requests are not queued")));
        }
        Ok(Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            data: None,
        })
    }

    /// Add a header (name is lowercased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Capture a mutating request. The body, if any, must be JSON.
    pub fn from_request(request: &Request) -> QueueResult<Self> {
        let mut operation = Self::new(request.method, request.url.clone())?;
        operation.headers = request.headers.clone();
        operation.data = match &request.body {
            Some(body) if !body.is_empty() => Some(
                serde_json::from_slice(body)
                    .map_err(|e| QueueError::InvalidOperation(format!("body is not JSON: {e}")))?,
            ),
            _ => None,
        };
        Ok(operation)
    }

    pub(crate) fn validate(&self) -> QueueResult<()> {
        if !self.method.is_mutating() {
            return Err(QueueError::InvalidOperation(format!(
                "{} requests are not queued",
                self.method
            )));
        }
        if self.url.is_empty() {
            return Err(QueueError::InvalidOperation("empty url".into()));
        }
        Ok(())
    }

    pub(crate) fn into_queued(self, id: OperationId, enqueued_at: DateTime<Utc>) -> QueuedOperation {
        QueuedOperation {
            id,
            method: self.method,
            url: self.url,
            headers: self.headers,
            data: self.data,
            enqueued_at,
        }
    }
}

/// A write persisted in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// Store-assigned id
    pub id: OperationId,
    /// Request method
    pub method: Method,
    /// Target endpoint
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// JSON body
    pub data: Option<serde_json::Value>,
    /// Insertion time
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedOperation {
    /// Rebuild the HTTP request for replay against `url`.
    ///
    /// The body is the JSON serialization of `data`; a `content-type` header
    /// is added only when the stored headers lack one.
    pub fn to_request(&self, url: impl Into<String>) -> Request {
        let mut request = Request::new(self.method, url).with_headers(self.headers.clone());
        if let Some(data) = &self.data {
            // Serializing a `Value` cannot fail.
            let body = serde_json::to_vec(data).unwrap_or_default();
            request = request.with_body(body);
            if request.header("content-type").is_none() {
                request = request.with_header("content-type", "application/json");
            }
        }
        request
    }
}

/// An operation the retry policy gave up on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The operation as it was queued
    pub operation: QueuedOperation,
    /// Why it was given up
    pub reason: String,
    /// Failed replay attempts at the time
    pub attempts: u32,
    /// When it left the live queue
    pub dead_lettered_at: DateTime<Utc>,
}

/// Persistent FIFO queue of pending writes
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Prepare the store. Idempotent; creates the schema on first use.
    async fn open(&self) -> QueueResult<()>;

    /// Append an operation with the next id
    async fn enqueue(&self, operation: NewOperation) -> QueueResult<QueuedOperation>;

    /// Every live operation in insertion order
    async fn list_all(&self) -> QueueResult<Vec<QueuedOperation>>;

    /// Delete exactly this entry. Unknown ids are a no-op.
    async fn remove(&self, id: OperationId) -> QueueResult<()>;

    /// Increment and return the failed-attempt counter of a live entry
    async fn record_failure(&self, id: OperationId) -> QueueResult<u32>;

    /// Failed-attempt counter of an entry (0 if never failed)
    async fn attempts(&self, id: OperationId) -> QueueResult<u32>;

    /// Atomically move a live entry to the dead-letter list
    async fn dead_letter(&self, id: OperationId, reason: &str) -> QueueResult<DeadLetter>;

    /// Every dead-lettered operation, oldest first
    async fn dead_letters(&self) -> QueueResult<Vec<DeadLetter>>;

    /// Number of live entries
    async fn len(&self) -> QueueResult<usize>;

    /// `true` when no live entries remain
    async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }
}
