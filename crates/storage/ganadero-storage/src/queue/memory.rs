//! Volatile queue engine

use super::{DeadLetter, NewOperation, OperationId, QueueStore, QueuedOperation};
use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Default)]
struct QueueState {
    // Ids start at 1 and are never reused, like SQLite AUTOINCREMENT
    last_id: OperationId,
    live: BTreeMap<OperationId, QueuedOperation>,
    attempts: HashMap<OperationId, u32>,
    dead: Vec<DeadLetter>,
}

/// In-memory queue for tests and ephemeral runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryQueueStore {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn open(&self) -> QueueResult<()> {
        Ok(())
    }

    async fn enqueue(&self, operation: NewOperation) -> QueueResult<QueuedOperation> {
        operation.validate()?;
        let mut state = self.state.lock();
        state.last_id += 1;
        let queued = operation.into_queued(state.last_id, Utc::now());
        state.live.insert(queued.id, queued.clone());
        Ok(queued)
    }

    async fn list_all(&self) -> QueueResult<Vec<QueuedOperation>> {
        Ok(self.state.lock().live.values().cloned().collect())
    }

    async fn remove(&self, id: OperationId) -> QueueResult<()> {
        let mut state = self.state.lock();
        state.live.remove(&id);
        state.attempts.remove(&id);
        Ok(())
    }

    async fn record_failure(&self, id: OperationId) -> QueueResult<u32> {
        let mut state = self.state.lock();
        if !state.live.contains_key(&id) {
            return Err(QueueError::NotFound(id));
        }
        let attempts = state.attempts.entry(id).or_insert(0);
        *attempts += 1;
        Ok(*attempts)
    }

    async fn attempts(&self, id: OperationId) -> QueueResult<u32> {
        Ok(self.state.lock().attempts.get(&id).copied().unwrap_or(0))
    }

    async fn dead_letter(&self, id: OperationId, reason: &str) -> QueueResult<DeadLetter> {
        let mut state = self.state.lock();
        let operation = state.live.remove(&id).ok_or(QueueError::NotFound(id))?;
        let attempts = state.attempts.remove(&id).unwrap_or(0);
        let letter = DeadLetter {
            operation,
            reason: reason.to_owned(),
            attempts,
            dead_lettered_at: Utc::now(),
        };
        state.dead.push(letter.clone());
        Ok(letter)
    }

    async fn dead_letters(&self) -> QueueResult<Vec<DeadLetter>> {
        Ok(self.state.lock().dead.clone())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.state.lock().live.len())
    }
}
