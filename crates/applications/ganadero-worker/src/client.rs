//! Page-side entry point for requests that must survive being offline

use crate::error::WorkerResult;
use crate::interceptor::Served;
use crate::worker::ServiceWorker;
use ganadero_core::{Request, Response};
use ganadero_net::{FetchError, NetworkState};
use ganadero_storage::{NewOperation, OperationId};
use std::sync::Arc;
use tracing::info;

/// What became of a submitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server (or a cache, for reads) answered
    Delivered(Response),
    /// The network was unreachable; the write is queued for replay
    Queued {
        /// Queue id of the stored operation
        id: OperationId,
    },
}

/// Sends reads through the worker and queues writes that cannot reach the server
#[derive(Clone)]
pub struct OfflineClient {
    worker: Arc<ServiceWorker>,
}

impl OfflineClient {
    /// Client bound to `worker`
    pub fn new(worker: Arc<ServiceWorker>) -> Self {
        Self { worker }
    }

    /// Submit `request`.
    ///
    /// Writes are queued only when the server cannot be reached at all; an
    /// HTTP error status is delivered as-is. A timeout is returned as an error
    /// rather than queued, since the server may already have applied the
    /// write. A write whose body is not JSON cannot be queued and fails with
    /// the queue's validation error.
    ///
    /// Queueing marks the worker offline, so the sync it registers waits for
    /// connectivity to come back. Any delivered write marks it online again.
    pub async fn submit(&self, request: Request) -> WorkerResult<SubmitOutcome> {
        if !request.method.is_mutating() {
            let Served { response, .. } = self.worker.fetch(request).await?;
            return Ok(SubmitOutcome::Delivered(response));
        }

        let mut outbound = request.clone();
        outbound.url = self.worker.resolver().resolve(&request.url)?.to_string();

        match self.worker.fetcher().fetch(&outbound).await {
            Ok(response) => {
                self.worker.connectivity().report(NetworkState::Online);
                Ok(SubmitOutcome::Delivered(response))
            }
            Err(e @ FetchError::NetworkUnavailable(_)) => {
                self.worker.connectivity().report(NetworkState::Offline);
                let queued = self
                    .worker
                    .queue()
                    .enqueue(NewOperation::from_request(&request)?)
                    .await?;
                info!(id = queued.id, method = %queued.method, url = %queued.url, reason = %e, "Queued write for background sync");
                self.worker.register_sync();
                Ok(SubmitOutcome::Queued { id: queued.id })
            }
            Err(e) => Err(e.into()),
        }
    }
}
