//! Manual sync triggers.

use axum::{extract::State, routing::post, Json, Router};

use crate::reconcile::{PullSummary, SyncSummary};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(push_all))
        .route("/sync/pull", post(pull_all))
}

/// Push every pending local change.
async fn push_all(State(state): State<AppState>) -> Json<SyncSummary> {
    Json(state.sync.sync_all().await)
}

/// Refresh the cache from the remote store.
async fn pull_all(State(state): State<AppState>) -> Json<PullSummary> {
    Json(state.sync.refresh_all().await)
}
