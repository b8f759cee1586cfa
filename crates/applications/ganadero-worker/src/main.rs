//! Offline worker daemon for the ERP Ganadero client

use anyhow::Context;
use ganadero_core::observability::init_tracing;
use ganadero_worker::{ServiceWorker, WorkerConfig, WorkerDeps};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("GANADERO_CONFIG"))
        .map(PathBuf::from);

    let config = WorkerConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_tracing(&config.logging)?;

    info!(
        config = ?config_path,
        static_cache = %config.cache_names().static_name,
        api_cache = %config.cache_names().api_name,
        "Starting ganadero-worker"
    );

    let deps = WorkerDeps::from_config(&config).await.context("opening stores")?;
    let worker = Arc::new(ServiceWorker::new(config, deps)?);

    let installed = worker.install().await.context("install")?;
    info!(cached = installed.cached.len(), skipped = installed.skipped.len(), "Installed");
    worker.activate().await.context("activate")?;

    let mut messages = worker.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(message) => info!(?message, "Client message"),
                Err(broadcast::error::RecvError::Lagged(missed)) => warn!(missed, "Message logger fell behind"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (stop, shutdown) = watch::channel(false);
    let runner = tokio::spawn(Arc::clone(&worker).run(shutdown));

    // Writes queued by a previous run
    worker.register_sync();

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");

    let _ = stop.send(true);
    if let Err(e) = runner.await {
        error!(error = %e, "Worker task failed");
    }
    worker.settle().await?;
    logger.abort();

    info!("ganadero-worker stopped");
    Ok(())
}
