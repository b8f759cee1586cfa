//! Ganadero Worker - offline-first layer of the ERP Ganadero client
//!
//! The [`ServiceWorker`] sits between the application and the network:
//!
//! - [`cache_manager`] fills the versioned static cache at install and drops
//!   stale partitions at activation.
//! - [`interceptor`] answers every request, network-first for the API and
//!   cache-first for everything else.
//! - [`client`] queues writes made while offline.
//! - [`sync`] replays the queue when connectivity returns and reports the
//!   result to open clients through the [`bridge`].
//! - [`push`] turns push messages into notifications.
//!
//! # Example
//!
//! ```rust,no_run
//! use ganadero_worker::{OfflineClient, ServiceWorker, WorkerConfig, WorkerDeps};
//! use ganadero_core::Request;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkerConfig::load(None)?;
//! let deps = WorkerDeps::from_config(&config).await?;
//! let worker = Arc::new(ServiceWorker::new(config, deps)?);
//! worker.install().await?;
//! worker.activate().await?;
//!
//! let client = OfflineClient::new(worker.clone());
//! let request = Request::new(ganadero_core::Method::Post, "/api/v1/animales")
//!     .with_json(&serde_json::json!({"arete": "MX-001"}))?;
//! client.submit(request).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod cache_manager;
pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod push;
#[cfg(any(test, feature = "test-utils"))]
pub mod recording;
pub mod sync;
pub mod worker;

pub use bridge::{MessageBridge, WorkerMessage};
pub use cache_manager::{ActivateReport, CacheManager, InstallReport};
pub use client::{OfflineClient, SubmitOutcome};
pub use config::{CacheNames, InstallPolicy, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use interceptor::{RequestInterceptor, ResponseSource, Served};
pub use push::{ClickOutcome, LogSink, Notification, NotificationSink, PushHandler, PushPayload};
#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingSink;
pub use sync::{RetryPolicy, SyncCoordinator, SyncRegistry, SyncReport};
pub use worker::{EventOutcome, ServiceWorker, WorkerDeps, WorkerEvent, WorkerState};
