//! Unified error handling for the gateway.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::reconcile::SyncError;
use crate::remote::RemoteError;
use crate::reservations::ReservationError;
use crate::store::StoreError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Reservation error: {0}")]
    Reservation(#[from] ReservationError),

    #[error("Engine error: {0}")]
    Engine(#[from] groundbook_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn store_failure(e: &StoreError) -> (StatusCode, String, Option<String>) {
    if let StoreError::Invalid(invalid) = e {
        tracing::warn!("Rejected record: {}", invalid);
        return (StatusCode::BAD_REQUEST, e.to_string(), None);
    }
    tracing::error!("Store error: {:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Local store error".to_string(),
        None,
    )
}

fn sync_failure(e: &SyncError) -> (StatusCode, String, Option<String>) {
    match e {
        SyncError::Store(e) => store_failure(e),
        SyncError::Remote(e @ RemoteError::Transport { .. }) => {
            tracing::warn!("Remote unreachable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Saved locally, remote store unreachable".to_string(),
                Some(e.to_string()),
            )
        }
        SyncError::Remote(e) => {
            tracing::warn!("Remote failure: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                "Saved locally, remote store refused the change".to_string(),
                Some(e.to_string()),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Store(e) => store_failure(e),
            AppError::Sync(e) => sync_failure(e),
            AppError::Reservation(e) => match e {
                ReservationError::Conflict { .. } | ReservationError::NotCancellable { .. } => {
                    (StatusCode::CONFLICT, e.to_string(), None)
                }
                ReservationError::Invalid(_) => (StatusCode::BAD_REQUEST, e.to_string(), None),
                ReservationError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string(), None),
                ReservationError::Store(e) => store_failure(e),
                ReservationError::Sync(e) => sync_failure(e),
            },
            AppError::Engine(e) => {
                tracing::warn!("Engine error: {:?}", e);
                (StatusCode::BAD_REQUEST, e.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
