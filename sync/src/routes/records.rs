//! Generic record endpoints over the local cache.
//!
//! Reads come from the cache only. Writes go through the sync manager, so
//! they are durable locally before any remote call. Bookings are routed
//! through the reservation workflow to get the overlap check.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use groundbook_engine::{with_entity_kind, Booking, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::reconcile::SyncOutcome;
use crate::store::StoreError;
use crate::AppState;

/// Optional owner filters for list requests.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub venue_id: Option<String>,
}

/// Body returned for writes.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// False when the record is only stored locally for now.
    pub synced: bool,
    pub record: Value,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/{kind}", get(list_records).put(save_record))
        .route("/api/{kind}/{id}", get(get_record).delete(delete_record))
}

async fn list_records(
    State(state): State<AppState>,
    Path(kind): Path<EntityKind>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    with_entity_kind!(kind, |E| {
        let records: Vec<E> = match (&query.user_id, &query.venue_id) {
            (Some(user_id), _) => state.store.list_where("userId", user_id).await?,
            (None, Some(venue_id)) => state.store.list_where("venueId", venue_id).await?,
            (None, None) => state.store.list().await?,
        };
        Ok(Json(to_json(&records)?))
    })
}

async fn get_record(
    State(state): State<AppState>,
    Path((kind, id)): Path<(EntityKind, String)>,
) -> Result<Json<Value>> {
    with_entity_kind!(kind, |E| {
        match state.store.get::<E>(&id).await? {
            Some(record) => Ok(Json(to_json(&record)?)),
            None => Err(AppError::NotFound(format!("{kind}/{id}"))),
        }
    })
}

async fn save_record(
    State(state): State<AppState>,
    Path(kind): Path<EntityKind>,
    Json(body): Json<Value>,
) -> Result<Json<SaveResponse>> {
    if kind == EntityKind::Booking {
        let booking: Booking = from_json(body)?;
        let outcome = state.reservations.reserve(booking).await?;
        return respond(outcome);
    }
    with_entity_kind!(kind, |E| {
        let entity: E = from_json(body)?;
        respond(state.sync.sync_entity(entity).await?)
    })
}

async fn delete_record(
    State(state): State<AppState>,
    Path((kind, id)): Path<(EntityKind, String)>,
) -> Result<Json<SaveResponse>> {
    let outcome = with_entity_kind!(kind, |E| state.sync.delete_entity::<E>(&id).await?);
    Ok(Json(SaveResponse {
        synced: outcome.is_synced(),
        record: Value::Null,
    }))
}

fn respond<E: Entity>(outcome: SyncOutcome<E>) -> Result<Json<SaveResponse>> {
    Ok(Json(SaveResponse {
        synced: outcome.is_synced(),
        record: to_json(outcome.entity())?,
    }))
}

fn from_json<E: Entity>(body: Value) -> Result<E> {
    serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("invalid {} record: {e}", E::KIND)))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Store(StoreError::from(e)))
}
