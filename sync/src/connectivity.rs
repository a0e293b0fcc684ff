//! Online/offline tracking.
//!
//! The platform (or [`poll_reachability`]) feeds [`NetworkSignal`]s into a
//! [`ConnectivityMonitor`]. Going offline takes effect immediately. Coming
//! back online waits for the link to settle, re-checks that the remote store
//! answers, and then runs a full sync pass.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::reconcile::{SyncManager, SyncSummary};
use crate::remote::HttpRemote;

/// Current reachability of the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Online,
    Offline,
}

/// A raw network event from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Available,
    Lost,
}

/// Shared, observable network state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<NetworkState>>,
}

impl Connectivity {
    pub fn new(initial: NetworkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> NetworkState {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state() == NetworkState::Online
    }

    /// Set the state. Returns whether it changed.
    pub fn set(&self, next: NetworkState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }
}

/// Confirms the remote store can actually be reached.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

#[async_trait]
impl ReachabilityProbe for HttpRemote {
    async fn is_reachable(&self) -> bool {
        match self.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Remote health check failed");
                false
            }
        }
    }
}

/// Drives [`Connectivity`] from network signals and triggers sync on
/// reconnect.
pub struct ConnectivityMonitor {
    sync: Arc<SyncManager>,
    probe: Arc<dyn ReachabilityProbe>,
    stabilization: Duration,
}

impl ConnectivityMonitor {
    pub fn new(
        sync: Arc<SyncManager>,
        probe: Arc<dyn ReachabilityProbe>,
        stabilization: Duration,
    ) -> Self {
        Self {
            sync,
            probe,
            stabilization,
        }
    }

    /// Apply one signal. Returns the sync summary when it triggered a pass.
    pub async fn handle(&self, signal: NetworkSignal) -> Option<SyncSummary> {
        let connectivity = self.sync.connectivity();
        match signal {
            NetworkSignal::Lost => {
                if connectivity.set(NetworkState::Offline) {
                    tracing::info!("Connection lost, sync suspended");
                }
                None
            }
            NetworkSignal::Available => {
                if connectivity.is_online() {
                    return None;
                }
                tokio::time::sleep(self.stabilization).await;
                if !self.probe.is_reachable().await {
                    tracing::debug!("Network reported available but remote is unreachable");
                    return None;
                }
                if !connectivity.set(NetworkState::Online) {
                    return None;
                }
                tracing::info!("Connection restored, starting sync");
                Some(self.sync.sync_all().await)
            }
        }
    }

    /// Process signals until the channel closes or shutdown is requested.
    pub async fn run(
        self,
        mut signals: mpsc::Receiver<NetworkSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        self.handle(signal).await;
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("Connectivity monitor stopped");
    }
}

/// Emit a signal every `every` based on whether `probe` succeeds.
///
/// Stands in for platform network callbacks when there are none.
pub async fn poll_reachability(
    probe: Arc<dyn ReachabilityProbe>,
    every: Duration,
    signals: mpsc::Sender<NetworkSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let signal = if probe.is_reachable().await {
                    NetworkSignal::Available
                } else {
                    NetworkSignal::Lost
                };
                if signals.send(signal).await.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_transitions_only() {
        let connectivity = Connectivity::new(NetworkState::Offline);
        let mut rx = connectivity.subscribe();

        assert!(!connectivity.set(NetworkState::Offline));
        assert!(!rx.has_changed().unwrap());

        assert!(connectivity.set(NetworkState::Online));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), NetworkState::Online);
        assert!(connectivity.is_online());
    }

    #[test]
    fn clones_share_state() {
        let a = Connectivity::new(NetworkState::Online);
        let b = a.clone();
        a.set(NetworkState::Offline);
        assert_eq!(b.state(), NetworkState::Offline);
    }
}
