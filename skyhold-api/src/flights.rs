use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skyhold_catalog::{Flight, FlightItinerary, SeatMapEntry, SeatOffer};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct LegQuery {
    pub leg_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct FlightDetails {
    #[serde(flatten)]
    pub itinerary: FlightItinerary,
    pub total_duration_minutes: i64,
    pub total_distance_km: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights", get(list_flights))
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/seats", get(available_seats))
        .route("/v1/flights/{id}/seat-map", get(seat_map))
}

/// GET /v1/flights
async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    Ok(Json(state.inventory.list_bookable_flights().await?))
}

/// GET /v1/flights/{id}
async fn get_flight(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<FlightDetails>, AppError> {
    let itinerary = state.inventory.get_itinerary(id).await?;
    Ok(Json(FlightDetails {
        total_duration_minutes: itinerary.total_duration().num_minutes(),
        total_distance_km: itinerary.total_distance_km(),
        itinerary,
    }))
}

/// GET /v1/flights/{id}/seats?leg_id=
async fn available_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LegQuery>,
) -> Result<Json<Vec<SeatOffer>>, AppError> {
    Ok(Json(state.inventory.available_seats(id, query.leg_id).await?))
}

/// GET /v1/flights/{id}/seat-map?leg_id=
async fn seat_map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LegQuery>,
) -> Result<Json<Vec<SeatMapEntry>>, AppError> {
    Ok(Json(state.inventory.seat_map(id, query.leg_id).await?))
}
