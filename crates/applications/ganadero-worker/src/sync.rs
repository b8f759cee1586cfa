//! Replay of queued writes
//!
//! A pass walks the live queue oldest-first, replays each operation once and
//! removes what the server accepted. Passes are single-flight: a second
//! caller waits for the running pass and then reads whatever is still queued.
//! A replay that never reached the server leaves the entry queued without
//! counting an attempt against it.

use crate::bridge::{MessageBridge, WorkerMessage};
use crate::error::WorkerResult;
use ganadero_net::{FetchError, Fetcher, UrlResolver};
use ganadero_storage::{QueuedOperation, SharedQueue};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// When to give up on an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Dead-letter after this many failed replays; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Dead-letter at once when the server rejects an operation permanently
    pub dead_letter_permanent: bool,
}

impl RetryPolicy {
    /// Policy from the config encoding, where `0` attempts means unlimited
    pub fn from_settings(max_attempts: u32, dead_letter_permanent: bool) -> Self {
        Self {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            dead_letter_permanent,
        }
    }

    fn gives_up(&self, attempts: u32, permanent: bool) -> bool {
        (permanent && self.dead_letter_permanent) || self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Replayed successfully and removed
    pub synced: usize,
    /// Failed and left queued
    pub failed: usize,
    /// Skipped because an earlier write to the same resource failed
    pub deferred: usize,
    /// Moved to the dead-letter list
    pub dead_lettered: usize,
    /// Whether `SYNC_COMPLETE` was posted
    pub broadcast: bool,
}

/// Classify a rejected replay. 408, 425 and 429 are worth retrying.
pub fn is_permanent_rejection(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 408 | 425 | 429)
}

enum Replay {
    Accepted(u16),
    Unreachable(String),
    Failed { reason: String, permanent: bool },
}

/// Drains the offline queue against the server
pub struct SyncCoordinator {
    queue: SharedQueue,
    fetcher: Arc<dyn Fetcher>,
    resolver: UrlResolver,
    bridge: MessageBridge,
    policy: RetryPolicy,
    replay_timeout: Duration,
    guard: tokio::sync::Mutex<()>,
}

impl SyncCoordinator {
    /// Coordinator replaying `queue` through `fetcher`
    pub fn new(
        queue: SharedQueue,
        fetcher: Arc<dyn Fetcher>,
        resolver: UrlResolver,
        bridge: MessageBridge,
        policy: RetryPolicy,
        replay_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            fetcher,
            resolver,
            bridge,
            policy,
            replay_timeout,
            guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Retry policy in force
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one pass.
    ///
    /// An empty queue finishes without a broadcast. Any queue error aborts
    /// the pass before the broadcast; entries already removed stay removed.
    pub async fn run_pass(&self) -> WorkerResult<SyncReport> {
        let _pass = self.guard.lock().await;

        let operations = self.queue.list_all().await?;
        let mut report = SyncReport::default();
        if operations.is_empty() {
            debug!("Offline queue empty; nothing to sync");
            return Ok(report);
        }

        info!(pending = operations.len(), "Starting sync pass");
        let mut failed_paths: Vec<String> = Vec::new();

        for operation in &operations {
            let path = self.resource_path(operation);
            if let Some(path) = &path {
                if failed_paths.iter().any(|failed| is_same_or_nested(path, failed)) {
                    debug!(id = operation.id, path = %path, "Deferring write behind failed resource");
                    metrics::counter!("ganadero_replays_total", "outcome" => "deferred").increment(1);
                    report.deferred += 1;
                    continue;
                }
            }

            match self.replay(operation).await {
                Replay::Accepted(status) => {
                    self.queue.remove(operation.id).await?;
                    debug!(id = operation.id, status, "Replayed queued write");
                    metrics::counter!("ganadero_replays_total", "outcome" => "synced").increment(1);
                    report.synced += 1;
                }
                Replay::Unreachable(reason) => {
                    failed_paths.extend(path);
                    debug!(id = operation.id, reason = %reason, "Server unreachable; keeping write queued");
                    metrics::counter!("ganadero_replays_total", "outcome" => "unreachable").increment(1);
                    report.failed += 1;
                }
                Replay::Failed { reason, permanent } => {
                    failed_paths.extend(path);
                    let attempts = self.queue.record_failure(operation.id).await?;
                    if self.policy.gives_up(attempts, permanent) {
                        self.queue.dead_letter(operation.id, &reason).await?;
                        warn!(id = operation.id, attempts, reason = %reason, "Dead-lettered queued write");
                        metrics::counter!("ganadero_replays_total", "outcome" => "dead_lettered").increment(1);
                        report.dead_lettered += 1;
                    } else {
                        warn!(id = operation.id, attempts, reason = %reason, "Replay failed; keeping write queued");
                        metrics::counter!("ganadero_replays_total", "outcome" => "failed").increment(1);
                        report.failed += 1;
                    }
                }
            }
        }

        self.bridge.broadcast(WorkerMessage::SyncComplete { count: report.synced });
        report.broadcast = true;
        info!(
            synced = report.synced,
            failed = report.failed,
            deferred = report.deferred,
            dead_lettered = report.dead_lettered,
            "Sync pass complete"
        );
        Ok(report)
    }

    async fn replay(&self, operation: &QueuedOperation) -> Replay {
        let url = match self.resolver.resolve(&operation.url) {
            Ok(url) => url,
            Err(e) => {
                return Replay::Failed {
                    reason: e.to_string(),
                    permanent: true,
                }
            }
        };
        let request = operation.to_request(url.as_str());

        match tokio::time::timeout(self.replay_timeout, self.fetcher.fetch(&request)).await {
            Ok(Ok(response)) if response.is_success() => Replay::Accepted(response.status),
            Ok(Ok(response)) => Replay::Failed {
                reason: format!("server answered {}", response.status),
                permanent: is_permanent_rejection(response.status),
            },
            Ok(Err(e @ FetchError::NetworkUnavailable(_))) => Replay::Unreachable(e.to_string()),
            Ok(Err(e)) => Replay::Failed {
                reason: e.to_string(),
                permanent: false,
            },
            Err(_) => Replay::Failed {
                reason: format!("no answer within {:?}", self.replay_timeout),
                permanent: false,
            },
        }
    }

    fn resource_path(&self, operation: &QueuedOperation) -> Option<String> {
        let url = self.resolver.resolve(&operation.url).ok()?;
        Some(url.path().trim_end_matches('/').to_string())
    }
}

fn is_same_or_nested(path: &str, parent: &str) -> bool {
    path == parent
        || path
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Pending background-sync tags.
///
/// Registering a tag that is already pending is a no-op, so a burst of
/// registrations collapses into one pass.
#[derive(Debug, Default)]
pub struct SyncRegistry {
    pending: Mutex<BTreeSet<String>>,
    notify: Notify,
}

impl SyncRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a sync under `tag`
    pub fn register(&self, tag: &str) {
        if self.pending.lock().insert(tag.to_string()) {
            debug!(tag, "Registered background sync");
            self.notify.notify_one();
        }
    }

    /// Remove and return every pending tag
    pub fn take_pending(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock()).into_iter().collect()
    }

    /// Wait until at least one tag is pending, then take them all
    pub async fn next(&self) -> Vec<String> {
        loop {
            let tags = self.take_pending();
            if !tags.is_empty() {
                return tags;
            }
            self.notify.notified().await;
        }
    }
}
