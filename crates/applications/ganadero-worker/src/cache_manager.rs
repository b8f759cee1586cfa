//! Install-time population and activate-time cleanup of cache partitions

use crate::config::{CacheNames, InstallPolicy};
use crate::error::{WorkerError, WorkerResult};
use futures::future::join_all;
use ganadero_core::{Request, Response};
use ganadero_net::{Fetcher, UrlResolver};
use ganadero_storage::{CachePartition, CacheStorage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of [`CacheManager::install`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Assets now in the static partition
    pub cached: Vec<String>,
    /// `(asset, reason)` for assets skipped under [`InstallPolicy::BestEffort`]
    pub skipped: Vec<(String, String)>,
}

/// Outcome of [`CacheManager::activate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale partitions that were deleted
    pub deleted: Vec<String>,
}

/// Owns the versioned partitions
pub struct CacheManager {
    caches: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    resolver: UrlResolver,
    names: CacheNames,
    manifest: Vec<String>,
    policy: InstallPolicy,
}

impl CacheManager {
    /// Manager for the partitions named by `names`
    pub fn new(
        caches: CacheStorage,
        fetcher: Arc<dyn Fetcher>,
        resolver: UrlResolver,
        names: CacheNames,
        manifest: Vec<String>,
        policy: InstallPolicy,
    ) -> Self {
        Self {
            caches,
            fetcher,
            resolver,
            names,
            manifest,
            policy,
        }
    }

    /// Current partition names
    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    /// Partition registry
    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    /// Handle to the current static partition
    pub fn static_partition(&self) -> WorkerResult<CachePartition> {
        Ok(self.caches.partition(&self.names.static_name)?)
    }

    /// Handle to the current API partition
    pub fn api_partition(&self) -> WorkerResult<CachePartition> {
        Ok(self.caches.partition(&self.names.api_name)?)
    }

    /// Open the static partition and fill it with every manifest asset
    pub async fn install(&self) -> WorkerResult<InstallReport> {
        let partition = self.caches.open(&self.names.static_name).await?;
        info!(
            partition = %self.names.static_name,
            assets = self.manifest.len(),
            policy = ?self.policy,
            "Installing static assets"
        );

        let fetched = join_all(self.manifest.iter().map(|asset| self.fetch_asset(asset))).await;

        let mut ready = Vec::new();
        let mut failures = Vec::new();
        for (asset, outcome) in self.manifest.iter().zip(fetched) {
            match outcome {
                Ok((request, response)) => ready.push((asset.clone(), request, response)),
                Err(reason) => {
                    warn!(asset = %asset, reason = %reason, "Manifest asset unavailable");
                    failures.push((asset.clone(), reason));
                }
            }
        }

        if self.policy == InstallPolicy::FailFast && !failures.is_empty() {
            return Err(WorkerError::Install { failures });
        }

        let mut report = InstallReport {
            cached: Vec::with_capacity(ready.len()),
            skipped: failures,
        };
        for (asset, request, response) in ready {
            partition.put(&request, &response).await?;
            debug!(asset = %asset, "Cached asset");
            report.cached.push(asset);
        }

        info!(cached = report.cached.len(), skipped = report.skipped.len(), "Install complete");
        Ok(report)
    }

    async fn fetch_asset(&self, asset: &str) -> Result<(Request, Response), String> {
        let url = self.resolver.resolve(asset).map_err(|e| e.to_string())?;
        let request = Request::get(url.as_str());
        match self.fetcher.fetch(&request).await {
            Ok(response) if response.is_success() => Ok((request, response)),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Delete every partition except the current two, then make sure both exist
    pub async fn activate(&self) -> WorkerResult<ActivateReport> {
        let mut report = ActivateReport::default();

        for name in self.caches.keys().await? {
            if self.names.is_current(&name) {
                continue;
            }
            if self.caches.delete(&name).await? {
                info!(partition = %name, "Deleted stale cache");
                report.deleted.push(name);
            }
        }

        self.caches.open(&self.names.static_name).await?;
        self.caches.open(&self.names.api_name).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ganadero_core::Method;
    use ganadero_net::MockFetcher;
    use ganadero_storage::backends::MemoryStorage;

    const ORIGIN: &str = "http://localhost:5173";

    fn names() -> CacheNames {
        CacheNames {
            static_name: "erp-ganadero-v2".into(),
            api_name: "erp-ganadero-api-v1".into(),
        }
    }

    fn manager(fetcher: &MockFetcher, policy: InstallPolicy) -> CacheManager {
        CacheManager::new(
            CacheStorage::new(Arc::new(MemoryStorage::default())),
            Arc::new(fetcher.clone()),
            UrlResolver::new(ORIGIN, "http://localhost:8000", "/api/").unwrap(),
            names(),
            vec!["/".into(), "/index.html".into(), "/index.css".into()],
            policy,
        )
    }

    fn serve_all(fetcher: &MockFetcher) {
        for path in ["/", "/index.html", "/index.css"] {
            fetcher.respond(Method::Get, format!("{ORIGIN}{path}"), Response::text(200, path));
        }
    }

    #[tokio::test]
    async fn test_install_caches_every_asset() {
        let fetcher = MockFetcher::new();
        serve_all(&fetcher);
        let manager = manager(&fetcher, InstallPolicy::FailFast);

        let report = manager.install().await.unwrap();
        assert_eq!(report.cached.len(), 3);

        let partition = manager.static_partition().unwrap();
        for path in ["/", "/index.html", "/index.css"] {
            let hit = partition
                .match_request(&Request::get(format!("{ORIGIN}{path}")))
                .await
                .unwrap();
            assert!(hit.is_some(), "{path} missing");
        }
    }

    #[tokio::test]
    async fn test_fail_fast_writes_nothing() {
        let fetcher = MockFetcher::new();
        serve_all(&fetcher);
        fetcher.respond(Method::Get, format!("{ORIGIN}/index.css"), Response::text(404, "nope"));
        let manager = manager(&fetcher, InstallPolicy::FailFast);

        let err = manager.install().await.unwrap_err();
        match err {
            WorkerError::Install { failures } => assert_eq!(failures[0].0, "/index.css"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(manager.static_partition().unwrap().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_best_effort_skips_failures() {
        let fetcher = MockFetcher::new();
        serve_all(&fetcher);
        fetcher.fail(
            Method::Get,
            format!("{ORIGIN}/index.css"),
            ganadero_net::FetchError::NetworkUnavailable("reset".into()),
        );
        let manager = manager(&fetcher, InstallPolicy::BestEffort);

        let report = manager.install().await.unwrap();
        assert_eq!(report.cached, vec!["/".to_string(), "/index.html".to_string()]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_activate_keeps_only_current_partitions() {
        let fetcher = MockFetcher::new();
        let manager = manager(&fetcher, InstallPolicy::FailFast);
        manager.caches().open("erp-ganadero-v1").await.unwrap();
        manager.caches().open("erp-ganadero-api-v0").await.unwrap();
        manager.caches().open("erp-ganadero-v2").await.unwrap();

        let report = manager.activate().await.unwrap();

        assert_eq!(
            report.deleted,
            vec!["erp-ganadero-api-v0".to_string(), "erp-ganadero-v1".to_string()]
        );
        assert_eq!(
            manager.caches().keys().await.unwrap(),
            vec!["erp-ganadero-api-v1".to_string(), "erp-ganadero-v2".to_string()]
        );
    }
}
