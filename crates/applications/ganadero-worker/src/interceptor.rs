//! Per-request caching strategies
//!
//! API requests are network-first with the API partition as fallback.
//! Everything else is cache-first against the static partition. Cache
//! writes run in the background and never fail the request that caused them.

use crate::error::WorkerResult;
use ganadero_core::{Method, Request, Response};
use ganadero_net::{Fetcher, UrlResolver};
use ganadero_storage::CachePartition;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fresh from the network
    Network,
    /// A stored copy
    Cache,
    /// Synthesized because neither network nor cache could answer
    OfflineFallback,
}

/// A response plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    /// What the page receives
    pub response: Response,
    /// Where it came from
    pub source: ResponseSource,
}

impl Served {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Body of the synthesized API response when offline with no cached copy
pub fn offline_api_response() -> Response {
    Response::json(
        503,
        &json!({"error": "Offline", "message": "No hay conexión a internet"}),
    )
}

/// Response for a static request nothing could satisfy
pub fn offline_text_response() -> Response {
    Response::text(503, "Offline")
}

/// Applies the caching strategy to every request from a controlled page
pub struct RequestInterceptor {
    fetcher: Arc<dyn Fetcher>,
    resolver: UrlResolver,
    static_partition: CachePartition,
    api_partition: CachePartition,
    shell: String,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl RequestInterceptor {
    /// Interceptor over the given partitions; `shell` is served to offline navigations
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        resolver: UrlResolver,
        static_partition: CachePartition,
        api_partition: CachePartition,
        shell: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            static_partition,
            api_partition,
            shell: shell.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Serve `request`. Relative URLs are resolved first.
    pub async fn handle(&self, mut request: Request) -> WorkerResult<Served> {
        let is_api = self.resolver.is_api(&request.url);
        request.url = self.resolver.resolve(&request.url)?.to_string();

        if is_api {
            Ok(self.network_first(request).await)
        } else {
            Ok(self.cache_first(request).await)
        }
    }

    async fn network_first(&self, request: Request) -> Served {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if request.method == Method::Get && response.status == 200 {
                    self.store_in_background(self.api_partition.clone(), request, response.clone());
                }
                Served::new(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "API request failed; trying cache");
                if let Some(cached) = self.lookup(&self.api_partition, &request).await {
                    metrics::counter!("ganadero_cache_hits_total", "partition" => "api").increment(1);
                    return Served::new(cached, ResponseSource::Cache);
                }
                metrics::counter!("ganadero_offline_fallbacks_total", "strategy" => "network_first").increment(1);
                Served::new(offline_api_response(), ResponseSource::OfflineFallback)
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Served {
        if let Some(cached) = self.lookup(&self.static_partition, &request).await {
            metrics::counter!("ganadero_cache_hits_total", "partition" => "static").increment(1);
            return Served::new(cached, ResponseSource::Cache);
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if request.method == Method::Get && response.status == 200 && !response.is_error_kind() {
                    self.store_in_background(self.static_partition.clone(), request, response.clone());
                }
                Served::new(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Static request failed");
                metrics::counter!("ganadero_offline_fallbacks_total", "strategy" => "cache_first").increment(1);
                if request.is_navigation() {
                    if let Some(shell) = self.shell_document().await {
                        return Served::new(shell, ResponseSource::OfflineFallback);
                    }
                }
                Served::new(offline_text_response(), ResponseSource::OfflineFallback)
            }
        }
    }

    async fn shell_document(&self) -> Option<Response> {
        let url = self.resolver.resolve(&self.shell).ok()?;
        self.lookup(&self.static_partition, &Request::get(url.as_str())).await
    }

    // A cache that cannot be read is treated as a miss
    async fn lookup(&self, partition: &CachePartition, request: &Request) -> Option<Response> {
        match partition.match_request(request).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(partition = partition.name(), url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    fn store_in_background(&self, partition: CachePartition, request: Request, response: Response) {
        let handle = tokio::spawn(async move {
            match partition.put(&request, &response).await {
                Ok(()) => debug!(partition = partition.name(), url = %request.url, "Cached response"),
                Err(e) => warn!(partition = partition.name(), url = %request.url, error = %e, "Cache write failed"),
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every background cache write started so far
    pub async fn settle(&self) {
        loop {
            let handles: Vec<_> = std::mem::take(&mut *self.pending.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Cache write task panicked");
                }
            }
        }
    }
}
