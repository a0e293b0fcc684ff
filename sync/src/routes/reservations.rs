//! Reservation workflow endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use groundbook_engine::{booking::parse_date, Booking};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: String,
    #[serde(default = "one_hour")]
    pub hours: u32,
}

fn one_hour() -> u32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub venue_id: String,
    pub fully_booked: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub venue_id: String,
    pub date: String,
    pub start_times: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub synced: bool,
    pub booking: Booking,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(reserve))
        .route("/reservations/{id}/cancel", post(cancel))
        .route("/availability/{venue_id}", get(availability))
        .route("/availability/{venue_id}/slots", get(open_slots))
}

async fn reserve(
    State(state): State<AppState>,
    Json(booking): Json<Booking>,
) -> Result<Json<BookingResponse>> {
    let outcome = state.reservations.reserve(booking).await?;
    Ok(Json(BookingResponse {
        synced: outcome.is_synced(),
        booking: outcome.into_entity(),
    }))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>> {
    let outcome = state.reservations.cancel(&id).await?;
    Ok(Json(BookingResponse {
        synced: outcome.is_synced(),
        booking: outcome.into_entity(),
    }))
}

async fn availability(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<AvailabilityResponse>> {
    let from = parse_date(&range.from)?;
    let to = parse_date(&range.to)?;
    if to < from {
        return Err(AppError::BadRequest("`to` is before `from`".to_string()));
    }
    let full = state.reservations.availability(&venue_id, from, to).await?;
    Ok(Json(AvailabilityResponse {
        venue_id,
        fully_booked: full.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
    }))
}

async fn open_slots(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotsResponse>> {
    let date = parse_date(&query.date)?;
    let slots = state.reservations.open_slots(&venue_id, date, query.hours).await?;
    Ok(Json(SlotsResponse {
        venue_id,
        date: date.format("%Y-%m-%d").to_string(),
        start_times: slots.iter().map(|t| t.format("%H:%M").to_string()).collect(),
    }))
}
