//! # Groundbook Sync
//!
//! The IO half of the offline-first booking client: a SQLite record cache,
//! a REST client for the remote store, the reconciler that moves local
//! writes upstream, connectivity tracking, the booking lifecycle worker and
//! a small local HTTP/WebSocket gateway for UI clients.
//!
//! Domain rules (overlap checks, status transitions, ratings) live in
//! `groundbook-engine`.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod reconcile;
pub mod remote;
pub mod reservations;
pub mod routes;
pub mod store;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use connectivity::{
    Connectivity, ConnectivityMonitor, NetworkSignal, NetworkState, ReachabilityProbe,
};
pub use lifecycle::{LifecycleReport, LifecycleWorker};
pub use reconcile::{PullSummary, SyncError, SyncManager, SyncOutcome, SyncSummary};
pub use remote::{Endpoint, HttpRemote, RemoteApi, RemoteConfig, RemoteError};
pub use reservations::{ReservationError, Reservations};
pub use store::{LocalStore, StoreChange, StoreError};

use crate::websocket::ConnectionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: LocalStore,
    pub sync: Arc<SyncManager>,
    pub reservations: Arc<Reservations>,
    pub conn_manager: Arc<ConnectionManager>,
}

/// The gateway router with tracing and permissive CORS for local UIs.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
