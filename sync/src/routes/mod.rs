//! HTTP route definitions.

mod health;
mod records;
mod reservations;
mod sync;
mod ws;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(records::routes())
        .merge(reservations::routes())
        .merge(sync::routes())
        .merge(ws::routes())
}
