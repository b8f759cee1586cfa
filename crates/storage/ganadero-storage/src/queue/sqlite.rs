//! SQLite queue engine
//!
//! Three tables: `offline_queue` (the live FIFO, `AUTOINCREMENT` ids so an id
//! is never reused after removal), `replay_attempts` (failure counters kept
//! apart from the immutable entries) and `dead_letters`.
//!
//! A live row that no longer decodes is moved to `dead_letters` when the
//! queue is listed, so it cannot hold back the entries behind it.

use super::{DeadLetter, NewOperation, OperationId, QueueStore, QueuedOperation};
use crate::config::SqliteQueueConfig;
use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ganadero_core::{Headers, Method};
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS offline_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        method TEXT NOT NULL,
        url TEXT NOT NULL,
        headers TEXT NOT NULL,
        data TEXT,
        enqueued_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS replay_attempts (
        operation_id INTEGER PRIMARY KEY,
        attempts INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dead_letters (
        id INTEGER PRIMARY KEY,
        method TEXT NOT NULL,
        url TEXT NOT NULL,
        headers TEXT NOT NULL,
        data TEXT,
        enqueued_at TEXT NOT NULL,
        reason TEXT NOT NULL,
        attempts INTEGER NOT NULL,
        dead_lettered_at TEXT NOT NULL
    );
";

const SELECT_LIVE: &str = "SELECT id, method, url, headers, data, enqueued_at FROM offline_queue";

/// Undecoded `offline_queue` row
struct RawOperation {
    id: i64,
    method: String,
    url: String,
    headers: String,
    data: Option<String>,
    enqueued_at: String,
}

impl RawOperation {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            headers: row.get(3)?,
            data: row.get(4)?,
            enqueued_at: row.get(5)?,
        })
    }

    fn decode(self) -> QueueResult<QueuedOperation> {
        let id = self.id as OperationId;
        let corrupt = |reason: String| QueueError::Corrupt { id, reason };

        let method: Method = self.method.parse().map_err(|e| corrupt(format!("{e}")))?;
        let headers: Headers =
            serde_json::from_str(&self.headers).map_err(|e| corrupt(format!("headers: {e}")))?;
        let data = self
            .data
            .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
            .transpose()
            .map_err(|e| corrupt(format!("data: {e}")))?;
        let enqueued_at = parse_timestamp(&self.enqueued_at).map_err(corrupt)?;

        Ok(QueuedOperation {
            id,
            method,
            url: self.url,
            headers,
            data,
            enqueued_at,
        })
    }
}

struct RawDeadLetter {
    operation: RawOperation,
    reason: String,
    attempts: u32,
    dead_lettered_at: String,
}

impl RawDeadLetter {
    fn decode(self) -> QueueResult<DeadLetter> {
        let id = self.operation.id as OperationId;
        let dead_lettered_at =
            parse_timestamp(&self.dead_lettered_at).map_err(|reason| QueueError::Corrupt { id, reason })?;
        Ok(DeadLetter {
            operation: self.operation.decode()?,
            reason: self.reason,
            attempts: self.attempts,
            dead_lettered_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("timestamp: {e}"))
}

/// Durable queue in a SQLite database file
pub struct SqliteQueueStore {
    config: SqliteQueueConfig,
    connection: OnceCell<AsyncConnection>,
}

impl SqliteQueueStore {
    /// Queue at `path` with WAL enabled
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(SqliteQueueConfig {
            path: path.as_ref().to_path_buf(),
            wal: true,
        })
    }

    /// Queue from explicit configuration
    pub fn with_config(config: SqliteQueueConfig) -> Self {
        Self {
            config,
            connection: OnceCell::new(),
        }
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    async fn connection(&self) -> QueueResult<&AsyncConnection> {
        self.connection
            .get_or_try_init(|| async {
                let path = self.config.path.clone();
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            QueueError::StorageUnavailable(format!("cannot create {}: {e}", parent.display()))
                        })?;
                    }
                }

                let connection = AsyncConnection::open(&path).await?;
                let wal = self.config.wal;
                connection
                    .call(move |conn| {
                        if wal {
                            let mode: String =
                                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                            debug!(journal_mode = %mode, "Configured queue journal");
                        }
                        conn.execute_batch(SCHEMA)?;
                        Ok(())
                    })
                    .await?;

                info!(path = %path.display(), "Opened offline queue");
                Ok::<_, QueueError>(connection)
            })
            .await
    }

    // Raw row copy so an undecodable entry can be moved too
    async fn move_to_dead_letters(&self, id: OperationId, reason: String) -> QueueResult<RawDeadLetter> {
        let key = id as i64;
        let dead_lettered_at = Utc::now().to_rfc3339();

        let raw = self
            .connection()
            .await?
            .call(move |conn| {
                let tx = conn.transaction()?;
                let operation = tx
                    .query_row(
                        &format!("{SELECT_LIVE} WHERE id = ?1"),
                        params![key],
                        RawOperation::from_row,
                    )
                    .optional()?;
                let Some(operation) = operation else {
                    return Ok(None);
                };
                let attempts: u32 = tx
                    .query_row(
                        "SELECT attempts FROM replay_attempts WHERE operation_id = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or(0);

                tx.execute(
                    "INSERT INTO dead_letters
                        (id, method, url, headers, data, enqueued_at, reason, attempts, dead_lettered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        operation.id,
                        operation.method,
                        operation.url,
                        operation.headers,
                        operation.data,
                        operation.enqueued_at,
                        reason,
                        attempts,
                        dead_lettered_at
                    ],
                )?;
                tx.execute("DELETE FROM offline_queue WHERE id = ?1", params![key])?;
                tx.execute("DELETE FROM replay_attempts WHERE operation_id = ?1", params![key])?;
                tx.commit()?;

                Ok(Some(RawDeadLetter {
                    operation,
                    reason,
                    attempts,
                    dead_lettered_at,
                }))
            })
            .await?;

        raw.ok_or(QueueError::NotFound(id))
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn open(&self) -> QueueResult<()> {
        self.connection().await.map(|_| ())
    }

    async fn enqueue(&self, operation: NewOperation) -> QueueResult<QueuedOperation> {
        operation.validate()?;
        let headers = serde_json::to_string(&operation.headers)
            .map_err(|e| QueueError::InvalidOperation(e.to_string()))?;
        let data = operation
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| QueueError::InvalidOperation(e.to_string()))?;
        let enqueued_at = Utc::now();
        let method = operation.method.as_str();
        let url = operation.url.clone();
        let timestamp = enqueued_at.to_rfc3339();

        let id = self
            .connection()
            .await?
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO offline_queue (method, url, headers, data, enqueued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![method, url, headers, data, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!(id, method, url = %operation.url, "Enqueued offline operation");
        Ok(operation.into_queued(id as OperationId, enqueued_at))
    }

    async fn list_all(&self) -> QueueResult<Vec<QueuedOperation>> {
        let rows = self
            .connection()
            .await?
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_LIVE} ORDER BY id ASC"))?;
                let rows = stmt
                    .query_map([], RawOperation::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let mut live = Vec::with_capacity(rows.len());
        for raw in rows {
            match raw.decode() {
                Ok(operation) => live.push(operation),
                Err(QueueError::Corrupt { id, reason }) => {
                    warn!(id, reason = %reason, "Undecodable queue entry; moving to dead letters");
                    self.move_to_dead_letters(id, format!("corrupt entry: {reason}")).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(live)
    }

    async fn remove(&self, id: OperationId) -> QueueResult<()> {
        let key = id as i64;
        self.connection()
            .await?
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM offline_queue WHERE id = ?1", params![key])?;
                tx.execute("DELETE FROM replay_attempts WHERE operation_id = ?1", params![key])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: OperationId) -> QueueResult<u32> {
        let key = id as i64;
        let attempts = self
            .connection()
            .await?
            .call(move |conn| {
                let tx = conn.transaction()?;
                let live: Option<i64> = tx
                    .query_row("SELECT id FROM offline_queue WHERE id = ?1", params![key], |row| row.get(0))
                    .optional()?;
                if live.is_none() {
                    return Ok(None);
                }
                tx.execute(
                    "INSERT INTO replay_attempts (operation_id, attempts) VALUES (?1, 1)
                     ON CONFLICT(operation_id) DO UPDATE SET attempts = attempts + 1",
                    params![key],
                )?;
                let attempts: u32 = tx.query_row(
                    "SELECT attempts FROM replay_attempts WHERE operation_id = ?1",
                    params![key],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(Some(attempts))
            })
            .await?;

        attempts.ok_or(QueueError::NotFound(id))
    }

    async fn attempts(&self, id: OperationId) -> QueueResult<u32> {
        let key = id as i64;
        let attempts = self
            .connection()
            .await?
            .call(move |conn| {
                let attempts: Option<u32> = conn
                    .query_row(
                        "SELECT attempts FROM replay_attempts WHERE operation_id = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(attempts)
            })
            .await?;
        Ok(attempts.unwrap_or(0))
    }

    async fn dead_letter(&self, id: OperationId, reason: &str) -> QueueResult<DeadLetter> {
        self.move_to_dead_letters(id, reason.to_owned()).await?.decode()
    }

    async fn dead_letters(&self) -> QueueResult<Vec<DeadLetter>> {
        let rows = self
            .connection()
            .await?
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, method, url, headers, data, enqueued_at, reason, attempts, dead_lettered_at
                     FROM dead_letters ORDER BY dead_lettered_at ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(RawDeadLetter {
                            operation: RawOperation::from_row(row)?,
                            reason: row.get(6)?,
                            attempts: row.get(7)?,
                            dead_lettered_at: row.get(8)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|raw| match raw.decode() {
                Ok(dead) => Some(dead),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable dead letter");
                    None
                }
            })
            .collect())
    }

    async fn len(&self) -> QueueResult<usize> {
        let count: i64 = self
            .connection()
            .await?
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))?))
            .await?;
        Ok(count as usize)
    }
}
