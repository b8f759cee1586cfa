//! Worker configuration

use ganadero_core::config::{load_layered, Validate};
use ganadero_core::observability::LoggingConfig;
use ganadero_core::{GanaderoError, GanaderoResult};
use ganadero_net::UrlResolver;
use ganadero_storage::config::{FileConfig, SqliteQueueConfig};
use ganadero_storage::{QueueConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variable overrides (`GANADERO__SYNC__TAG=...`)
pub const ENV_PREFIX: &str = "GANADERO";

/// Complete worker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache partitions and install manifest
    pub cache: CacheSettings,
    /// Origins and HTTP client
    pub network: NetworkSettings,
    /// Offline queue and replay
    pub sync: SyncSettings,
    /// Health probing
    pub connectivity: ConnectivitySettings,
    /// Log output
    pub logging: LoggingConfig,
}

/// What install does when a manifest asset cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPolicy {
    /// Any failure aborts the install and nothing is cached
    #[default]
    FailFast,
    /// Cache what can be fetched and report the rest
    BestEffort,
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Shared prefix of both partition names
    pub prefix: String,
    /// Version token of the static partition
    pub static_version: String,
    /// Version token of the API partition
    pub api_version: String,
    /// Assets fetched at install
    pub manifest: Vec<String>,
    /// Install failure policy
    pub install_policy: InstallPolicy,
    /// Navigation fallback document
    pub shell: String,
    /// Key-value backend holding the partitions
    pub storage: StorageConfig,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: "erp-ganadero".to_string(),
            static_version: "v2-1.0.0".to_string(),
            api_version: "api-v1".to_string(),
            manifest: ["/", "/index.html", "/index.css", "/src/main.tsx", "/src/App.tsx", "/manifest.json"]
                .into_iter()
                .map(String::from)
                .collect(),
            install_policy: InstallPolicy::FailFast,
            shell: "/index.html".to_string(),
            storage: StorageConfig::File(FileConfig {
                path: PathBuf::from("ganadero-data/cache.json"),
            }),
        }
    }
}

/// Names of the two partitions owned by the current version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    /// Static asset partition
    pub static_name: String,
    /// API response partition
    pub api_name: String,
}

impl CacheNames {
    /// Whether `name` is one of the current partitions
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_name || name == self.api_name
    }
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Origin serving the application shell
    pub origin: String,
    /// Base URL relative API paths resolve against
    pub api_base_url: String,
    /// Path prefix selecting the network-first strategy
    pub api_prefix: String,
    /// Deadline for ordinary requests
    pub request_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Offline queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Background-sync tag that triggers a pass
    pub tag: String,
    /// Deadline for a single replay
    pub replay_timeout_secs: u64,
    /// Dead-letter an operation after this many failed replays (0 = never)
    pub max_attempts: u32,
    /// Dead-letter operations the server rejected permanently
    pub dead_letter_permanent: bool,
    /// Queue engine
    pub queue: QueueConfig,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tag: "sync-offline-data".to_string(),
            replay_timeout_secs: 30,
            max_attempts: 0,
            dead_letter_permanent: false,
            queue: QueueConfig::Sqlite(SqliteQueueConfig {
                path: PathBuf::from("ganadero-data/offline-queue.db"),
                wal: true,
            }),
        }
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    /// URL probed for reachability; any HTTP answer means online
    pub probe_url: String,
    /// Seconds between probes (0 disables the monitor)
    pub interval_secs: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            probe_url: "http://localhost:8000/".to_string(),
            interval_secs: 15,
        }
    }
}

impl WorkerConfig {
    /// Load defaults, then `path` (if any), then `GANADERO__*` variables
    pub fn load(path: Option<&Path>) -> GanaderoResult<Self> {
        load_layered(path, ENV_PREFIX)
    }

    /// `{prefix}-{static_version}` and `{prefix}-{api_version}`
    pub fn cache_names(&self) -> CacheNames {
        CacheNames {
            static_name: format!("{}-{}", self.cache.prefix, self.cache.static_version),
            api_name: format!("{}-{}", self.cache.prefix, self.cache.api_version),
        }
    }

    /// URL resolver for the configured origins
    pub fn resolver(&self) -> GanaderoResult<UrlResolver> {
        UrlResolver::new(
            &self.network.origin,
            &self.network.api_base_url,
            &self.network.api_prefix,
        )
        .map_err(|e| GanaderoError::config(e.to_string()))
    }

    /// Per-replay deadline
    pub fn replay_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.replay_timeout_secs)
    }

    /// Request deadline for the HTTP client
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    /// Time between connectivity probes
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.interval_secs)
    }
}

impl Validate for WorkerConfig {
    fn validate(&self) -> GanaderoResult<()> {
        let cache = &self.cache;
        if cache.prefix.is_empty() || cache.static_version.is_empty() || cache.api_version.is_empty() {
            return Err(GanaderoError::config("cache prefix and versions must not be empty"));
        }
        let names = self.cache_names();
        if names.static_name.contains('/') || names.api_name.contains('/') {
            return Err(GanaderoError::config("cache names must not contain '/'"));
        }
        if names.static_name == names.api_name {
            return Err(GanaderoError::config("static and API caches must have different names"));
        }
        if cache.manifest.iter().any(String::is_empty) {
            return Err(GanaderoError::config("manifest entries must not be empty"));
        }
        if cache.shell.is_empty() {
            return Err(GanaderoError::config("shell document must not be empty"));
        }

        self.resolver()?;

        if self.network.request_timeout_secs == 0 {
            return Err(GanaderoError::config("network.request_timeout_secs must be positive"));
        }
        if self.sync.tag.is_empty() {
            return Err(GanaderoError::config("sync.tag must not be empty"));
        }
        if self.sync.replay_timeout_secs == 0 {
            return Err(GanaderoError::config("sync.replay_timeout_secs must be positive"));
        }
        if self.connectivity.interval_secs > 0 && self.connectivity.probe_url.is_empty() {
            return Err(GanaderoError::config("connectivity.probe_url must be set when probing"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ganadero_core::config::from_toml_str;
    use std::io::Write;

    #[test]
    fn test_defaults_match_deployed_names() {
        let config = WorkerConfig::default();
        config.validate().unwrap();

        let names = config.cache_names();
        assert_eq!(names.static_name, "erp-ganadero-v2-1.0.0");
        assert_eq!(names.api_name, "erp-ganadero-api-v1");
        assert_eq!(config.cache.manifest.len(), 6);
        assert_eq!(config.sync.tag, "sync-offline-data");
        assert_eq!(config.replay_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: WorkerConfig = from_toml_str(
            r#"
            [cache]
            static_version = "v3-0.1.0"
            install_policy = "best_effort"

            [sync]
            max_attempts = 5

            [sync.queue]
            type = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_names().static_name, "erp-ganadero-v3-0.1.0");
        assert_eq!(config.cache.install_policy, InstallPolicy::BestEffort);
        assert_eq!(config.sync.max_attempts, 5);
        assert_eq!(config.sync.queue, QueueConfig::Memory);
        assert_eq!(config.network.api_prefix, "/api/");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = WorkerConfig::default();
        config.cache.api_version = config.cache.static_version.clone();
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.network.api_base_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.sync.replay_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ntag = \"from-file\"\nreplay_timeout_secs = 12").unwrap();
        file.flush().unwrap();

        temp_env::with_vars([("GANADERO__SYNC__TAG", Some("from-env"))], || {
            let config = WorkerConfig::load(Some(file.path())).unwrap();
            assert_eq!(config.sync.tag, "from-env");
            assert_eq!(config.sync.replay_timeout_secs, 12);
        });
    }
}
