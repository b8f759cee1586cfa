//! Online/offline detection by probing a health endpoint

use crate::fetcher::Fetcher;
use ganadero_core::Request;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Whether the backend is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkState {
    /// Connected to network
    Online,
    /// No network connectivity
    Offline,
}

impl NetworkState {
    /// `true` for [`NetworkState::Online`]
    pub fn is_online(self) -> bool {
        self == NetworkState::Online
    }
}

/// A change of [`NetworkState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline to online
    WentOnline,
    /// Online to offline
    WentOffline,
}

/// Tracks connectivity and publishes every change on a watch channel.
///
/// Any HTTP response to the probe counts as online, even an error status:
/// only the absence of a response means offline.
pub struct ConnectivityMonitor {
    fetcher: Arc<dyn Fetcher>,
    probe: Request,
    interval: Duration,
    state: watch::Sender<NetworkState>,
}

impl ConnectivityMonitor {
    /// Monitor probing `probe_url` every `interval`, starting from `initial`
    pub fn new(fetcher: Arc<dyn Fetcher>, probe_url: impl Into<String>, interval: Duration, initial: NetworkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            fetcher,
            probe: Request::get(probe_url),
            interval,
            state,
        }
    }

    /// Last known state
    pub fn state(&self) -> NetworkState {
        *self.state.borrow()
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    /// Record an observation; returns the transition if the state changed
    pub fn report(&self, observed: NetworkState) -> Option<Transition> {
        let changed = self.state.send_if_modified(|current| {
            if *current == observed {
                false
            } else {
                *current = observed;
                true
            }
        });

        if !changed {
            return None;
        }
        let transition = match observed {
            NetworkState::Online => Transition::WentOnline,
            NetworkState::Offline => Transition::WentOffline,
        };
        info!(?transition, "Connectivity changed");
        Some(transition)
    }

    /// Probe once and record the result
    pub async fn probe_once(&self) -> Option<Transition> {
        let observed = match self.fetcher.fetch(&self.probe).await {
            Ok(response) => {
                debug!(status = response.status, "Connectivity probe answered");
                NetworkState::Online
            }
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                NetworkState::Offline
            }
        };
        self.report(observed)
    }

    /// Probe on the configured interval until `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if self.interval.is_zero() {
            warn!("Connectivity probe interval is zero; monitor disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Connectivity monitor stopping");
                        return;
                    }
                }
            }
        }
    }
}
