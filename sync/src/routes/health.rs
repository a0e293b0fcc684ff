//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::connectivity::NetworkState;
use crate::error::Result;
use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: NetworkState,
    /// Local changes not yet acknowledged by the remote store.
    pub pending: i64,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.sync.connectivity().state(),
        pending: state.store.pending_count().await?,
    }))
}

async fn root() -> &'static str {
    "Groundbook Sync"
}
