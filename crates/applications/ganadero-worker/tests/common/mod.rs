//! Shared fixtures for worker integration tests

#![allow(dead_code)]

use ganadero_core::{Method, Response};
use ganadero_net::MockFetcher;
use ganadero_storage::backends::MemoryStorage;
use ganadero_storage::{InMemoryQueueStore, SharedQueue, SharedStorage};
use ganadero_worker::{RecordingSink, ServiceWorker, WorkerConfig, WorkerDeps};
use std::sync::Arc;

pub const ORIGIN: &str = "http://localhost:5173";
pub const API: &str = "http://localhost:8000";

/// A worker over scripted network and in-memory stores
pub struct WorkerFixture {
    pub fetcher: MockFetcher,
    pub cache_backend: SharedStorage,
    pub queue: SharedQueue,
    pub sink: Arc<RecordingSink>,
    pub worker: Arc<ServiceWorker>,
}

impl WorkerFixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: WorkerConfig) -> Self {
        let fetcher = MockFetcher::new();
        let cache_backend: SharedStorage = Arc::new(MemoryStorage::default());
        let queue: SharedQueue = Arc::new(InMemoryQueueStore::new());
        Self::assemble(config, fetcher, cache_backend, queue)
    }

    /// A second worker version sharing this fixture's stores and network
    pub fn upgrade(&self, config: WorkerConfig) -> Self {
        Self::assemble(config, self.fetcher.clone(), self.cache_backend.clone(), self.queue.clone())
    }

    /// The same worker configuration over a different queue
    pub fn with_queue(&self, queue: SharedQueue) -> Self {
        Self::assemble(self.worker.config().clone(), self.fetcher.clone(), self.cache_backend.clone(), queue)
    }

    fn assemble(config: WorkerConfig, fetcher: MockFetcher, cache_backend: SharedStorage, queue: SharedQueue) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let deps = WorkerDeps {
            fetcher: Arc::new(fetcher.clone()),
            cache_backend: cache_backend.clone(),
            queue: queue.clone(),
            notifications: sink.clone(),
        };
        let worker = Arc::new(ServiceWorker::new(config, deps).expect("valid test config"));
        Self {
            fetcher,
            cache_backend,
            queue,
            sink,
            worker,
        }
    }

    /// Serve every manifest asset with a 200
    pub fn serve_manifest(&self) {
        for asset in &self.worker.config().cache.manifest {
            self.fetcher
                .respond(Method::Get, format!("{ORIGIN}{asset}"), Response::text(200, asset));
        }
    }

    /// Serve the manifest, install and activate
    pub async fn activated(self) -> Self {
        self.serve_manifest();
        self.worker.install().await.expect("install");
        self.worker.activate().await.expect("activate");
        self
    }
}

/// Defaults with volatile stores and the monitor off
pub fn test_config() -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.connectivity.interval_secs = 0;
    config.sync.queue = ganadero_storage::QueueConfig::Memory;
    config.cache.storage = ganadero_storage::StorageConfig::default();
    config
}

pub fn api(path: &str) -> String {
    format!("{API}{path}")
}
