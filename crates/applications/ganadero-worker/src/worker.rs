//! The worker singleton: lifecycle, event dispatch and background tasks

use crate::bridge::{MessageBridge, WorkerMessage};
use crate::cache_manager::{ActivateReport, CacheManager, InstallReport};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::interceptor::{RequestInterceptor, ResponseSource, Served};
use crate::push::{ClickOutcome, LogSink, Notification, NotificationSink, PushHandler};
use crate::sync::{RetryPolicy, SyncCoordinator, SyncRegistry, SyncReport};
use ganadero_core::config::Validate;
use ganadero_core::Request;
use ganadero_net::{ConnectivityMonitor, Fetcher, HttpFetcher, HttpFetcherConfig, NetworkState, Transition, UrlResolver};
use ganadero_storage::{open_queue, open_storage, CacheError, CacheStorage, SharedQueue, SharedStorage};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// Lifecycle of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet installed
    Parsed,
    /// Fetching the manifest
    Installing,
    /// Manifest cached, waiting to activate
    Installed,
    /// Cleaning up old partitions
    Activating,
    /// Controlling requests
    Activated,
    /// Install failed; this instance will never activate
    Redundant,
}

/// External resources the worker runs on
pub struct WorkerDeps {
    /// Outbound HTTP
    pub fetcher: Arc<dyn Fetcher>,
    /// Backend holding the cache partitions
    pub cache_backend: SharedStorage,
    /// Offline write queue
    pub queue: SharedQueue,
    /// Where notifications are shown
    pub notifications: Arc<dyn NotificationSink>,
}

impl WorkerDeps {
    /// Production dependencies described by `config`. The queue is opened here.
    pub async fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let fetcher = HttpFetcher::with_config(HttpFetcherConfig {
            timeout: config.request_timeout(),
            ..HttpFetcherConfig::default()
        })?;
        let cache_backend = open_storage(&config.cache.storage).map_err(CacheError::from)?;
        let queue = open_queue(&config.sync.queue)?;
        queue.open().await?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            cache_backend,
            queue,
            notifications: Arc::new(LogSink),
        })
    }
}

/// An event delivered to the worker
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Populate the static cache
    Install,
    /// Take control and drop stale caches
    Activate,
    /// A request from a controlled page
    Fetch(Request),
    /// A background-sync tag fired
    Sync(String),
    /// A push message with optional data
    Push(Option<Vec<u8>>),
    /// The user clicked a notification
    NotificationClick(Notification),
}

impl WorkerEvent {
    /// Event name used for the task span
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Sync(_) => "sync",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick(_) => "notification_click",
        }
    }
}

/// Result of a dispatched [`WorkerEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Install finished
    Installed(InstallReport),
    /// Activate finished
    Activated(ActivateReport),
    /// The response for a fetch
    Fetched(Served),
    /// A sync pass ran, or `None` if the tag was not ours
    Synced(Option<SyncReport>),
    /// The notification that was shown
    Notified(Notification),
    /// What the click did
    Clicked(ClickOutcome),
}

/// Composes caches, queue, sync, messaging and connectivity
pub struct ServiceWorker {
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    fetcher: Arc<dyn Fetcher>,
    resolver: UrlResolver,
    caches: CacheManager,
    interceptor: RequestInterceptor,
    queue: SharedQueue,
    sync: SyncCoordinator,
    registry: SyncRegistry,
    bridge: MessageBridge,
    push: PushHandler,
    connectivity: ConnectivityMonitor,
}

impl ServiceWorker {
    /// Validate `config` and wire the components together
    pub fn new(config: WorkerConfig, deps: WorkerDeps) -> WorkerResult<Self> {
        config.validate().map_err(|e| WorkerError::Config(e.to_string()))?;
        let resolver = config.resolver()?;
        let names = config.cache_names();
        let bridge = MessageBridge::default();

        let caches = CacheManager::new(
            CacheStorage::new(deps.cache_backend),
            deps.fetcher.clone(),
            resolver.clone(),
            names,
            config.cache.manifest.clone(),
            config.cache.install_policy,
        );
        let interceptor = RequestInterceptor::new(
            deps.fetcher.clone(),
            resolver.clone(),
            caches.static_partition()?,
            caches.api_partition()?,
            config.cache.shell.clone(),
        );
        let sync = SyncCoordinator::new(
            deps.queue.clone(),
            deps.fetcher.clone(),
            resolver.clone(),
            bridge.clone(),
            RetryPolicy::from_settings(config.sync.max_attempts, config.sync.dead_letter_permanent),
            config.replay_timeout(),
        );
        let connectivity = ConnectivityMonitor::new(
            deps.fetcher.clone(),
            config.connectivity.probe_url.clone(),
            config.probe_interval(),
            NetworkState::Online,
        );

        Ok(Self {
            state: Mutex::new(WorkerState::Parsed),
            fetcher: deps.fetcher,
            resolver,
            caches,
            interceptor,
            queue: deps.queue,
            sync,
            registry: SyncRegistry::new(),
            bridge,
            push: PushHandler::new(deps.notifications),
            connectivity,
            config,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Configuration in force
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Outbound HTTP
    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// URL resolution for the configured origins
    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Cache partitions
    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    /// Offline write queue
    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// Messaging bridge to clients
    pub fn bridge(&self) -> &MessageBridge {
        &self.bridge
    }

    /// Connect a client to the bridge
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.bridge.subscribe()
    }

    /// Connectivity tracking
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    fn advance(&self, action: &'static str, from: WorkerState, to: WorkerState) -> WorkerResult<()> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(WorkerError::InvalidState { action, state: *state });
        }
        debug!(?from, ?to, "Worker state change");
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: WorkerState) {
        *self.state.lock() = to;
    }

    /// Cache the install manifest. A failure leaves the worker redundant.
    pub async fn install(&self) -> WorkerResult<InstallReport> {
        self.advance("install", WorkerState::Parsed, WorkerState::Installing)?;
        match self.caches.install().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Install failed; worker is redundant");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Drop stale partitions and start controlling requests
    pub async fn activate(&self) -> WorkerResult<ActivateReport> {
        self.advance("activate", WorkerState::Installed, WorkerState::Activating)?;
        match self.caches.activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated);
                info!(deleted = report.deleted.len(), "Worker activated");
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed);
                Err(e)
            }
        }
    }

    /// Answer a request from a page.
    ///
    /// Until activation the caches are not consulted and network errors are
    /// returned to the caller.
    pub async fn fetch(&self, request: Request) -> WorkerResult<Served> {
        if self.state() == WorkerState::Activated {
            return self.interceptor.handle(request).await;
        }

        let mut request = request;
        request.url = self.resolver.resolve(&request.url)?.to_string();
        let response = self.fetcher.fetch(&request).await?;
        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }

    /// Handle a background-sync event. Tags other than the configured one are ignored.
    pub async fn sync(&self, tag: &str) -> WorkerResult<Option<SyncReport>> {
        if tag != self.config.sync.tag {
            debug!(tag, "Ignoring unknown sync tag");
            return Ok(None);
        }
        self.sync_now().await.map(Some)
    }

    /// Run a sync pass regardless of tag
    pub async fn sync_now(&self) -> WorkerResult<SyncReport> {
        self.sync.run_pass().await
    }

    /// Ask for a sync pass under the configured tag
    pub fn register_sync(&self) {
        self.registry.register(&self.config.sync.tag);
    }

    /// Show the notification for a push message
    pub async fn push(&self, data: Option<&[u8]>) -> Notification {
        self.push.on_push(data).await
    }

    /// React to a notification click
    pub async fn notification_click(&self, notification: &Notification) -> ClickOutcome {
        self.push.on_click(notification).await
    }

    /// Tell clients about a connectivity change; coming online triggers a sync
    pub fn handle_transition(&self, transition: Transition) {
        let online = transition == Transition::WentOnline;
        self.bridge.broadcast(WorkerMessage::ConnectivityChanged { online });
        if online {
            self.register_sync();
        }
    }

    /// Run `event` as its own task
    pub fn dispatch(self: &Arc<Self>, event: WorkerEvent) -> JoinHandle<WorkerResult<EventOutcome>> {
        let worker = Arc::clone(self);
        let span = info_span!("event", name = event.name());
        tokio::spawn(
            async move {
                match event {
                    WorkerEvent::Install => worker.install().await.map(EventOutcome::Installed),
                    WorkerEvent::Activate => worker.activate().await.map(EventOutcome::Activated),
                    WorkerEvent::Fetch(request) => worker.fetch(request).await.map(EventOutcome::Fetched),
                    WorkerEvent::Sync(tag) => worker.sync(&tag).await.map(EventOutcome::Synced),
                    WorkerEvent::Push(data) => Ok(EventOutcome::Notified(worker.push(data.as_deref()).await)),
                    WorkerEvent::NotificationClick(notification) => {
                        Ok(EventOutcome::Clicked(worker.notification_click(&notification).await))
                    }
                }
            }
            .instrument(span),
        )
    }

    /// Probe connectivity and serve sync registrations until `shutdown` flips to `true`.
    ///
    /// Tags registered while offline are held and run once connectivity returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let monitor = tokio::spawn({
            let worker = Arc::clone(&self);
            let shutdown = shutdown.clone();
            async move { worker.connectivity.run(shutdown).await }
        });
        let mut states = self.connectivity.subscribe();
        let mut held: BTreeSet<String> = BTreeSet::new();

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let transition = match *states.borrow_and_update() {
                        NetworkState::Online => Transition::WentOnline,
                        NetworkState::Offline => Transition::WentOffline,
                    };
                    self.handle_transition(transition);
                    if transition == Transition::WentOnline {
                        for tag in std::mem::take(&mut held) {
                            self.registry.register(&tag);
                        }
                    }
                }
                tags = self.registry.next() => {
                    if !self.connectivity.state().is_online() {
                        debug!(?tags, "Offline; holding sync until connectivity returns");
                        held.extend(tags);
                        continue;
                    }
                    for tag in tags {
                        if let Err(e) = self.sync(&tag).instrument(info_span!("event", name = "sync")).await {
                            warn!(tag = %tag, error = %e, "Sync pass failed; will retry on next registration");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = monitor.await {
            warn!(error = %e, "Connectivity monitor task failed");
        }
        debug!("Worker stopped");
    }

    /// Wait for background cache writes and flush the cache backend
    pub async fn settle(&self) -> WorkerResult<()> {
        self.interceptor.settle().await;
        self.caches.caches().flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingSink;
    use ganadero_core::{Method, Response};
    use ganadero_net::MockFetcher;
    use ganadero_storage::backends::MemoryStorage;
    use ganadero_storage::InMemoryQueueStore;

    fn worker(fetcher: &MockFetcher) -> Arc<ServiceWorker> {
        let mut config = WorkerConfig::default();
        config.cache.manifest = vec!["/index.html".into()];
        let deps = WorkerDeps {
            fetcher: Arc::new(fetcher.clone()),
            cache_backend: Arc::new(MemoryStorage::default()),
            queue: Arc::new(InMemoryQueueStore::new()),
            notifications: Arc::new(RecordingSink::new()),
        };
        Arc::new(ServiceWorker::new(config, deps).unwrap())
    }

    #[tokio::test]
    async fn test_lifecycle_order_enforced() {
        let fetcher = MockFetcher::new();
        fetcher.respond(Method::Get, "http://localhost:5173/index.html", Response::text(200, "<html/>"));
        let worker = worker(&fetcher);

        assert!(matches!(
            worker.activate().await,
            Err(WorkerError::InvalidState { state: WorkerState::Parsed, .. })
        ));
        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
        assert!(worker.install().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let fetcher = MockFetcher::new();
        let worker = worker(&fetcher);

        assert!(worker.install().await.is_err());
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(worker.activate().await.is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = WorkerConfig::default();
        config.sync.tag = String::new();
        let deps = WorkerDeps {
            fetcher: Arc::new(MockFetcher::new()),
            cache_backend: Arc::new(MemoryStorage::default()),
            queue: Arc::new(InMemoryQueueStore::new()),
            notifications: Arc::new(RecordingSink::new()),
        };

        assert!(matches!(ServiceWorker::new(config, deps), Err(WorkerError::Config(_))));
    }

    #[tokio::test]
    async fn test_unknown_sync_tag_ignored() {
        let fetcher = MockFetcher::new();
        let worker = worker(&fetcher);

        assert_eq!(worker.sync("periodic-refresh").await.unwrap(), None);
        assert_eq!(worker.sync("sync-offline-data").await.unwrap(), Some(SyncReport::default()));
    }

    #[tokio::test]
    async fn test_transitions_broadcast() {
        let fetcher = MockFetcher::new();
        let worker = worker(&fetcher);
        let mut client = worker.subscribe();

        worker.handle_transition(Transition::WentOffline);
        worker.handle_transition(Transition::WentOnline);

        assert_eq!(client.recv().await.unwrap(), WorkerMessage::ConnectivityChanged { online: false });
        assert_eq!(client.recv().await.unwrap(), WorkerMessage::ConnectivityChanged { online: true });
    }

    #[tokio::test]
    async fn test_dispatch_runs_named_events() {
        let fetcher = MockFetcher::new();
        let worker = worker(&fetcher);

        let outcome = worker.dispatch(WorkerEvent::Push(None)).await.unwrap().unwrap();
        match outcome {
            EventOutcome::Notified(notification) => assert_eq!(notification.title, "ERP Ganadero"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
