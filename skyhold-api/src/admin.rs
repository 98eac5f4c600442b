use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use skyhold_catalog::{ConfigureSeatRequest, FlightBookingConfig, SeatOffer};
use skyhold_core::PassengerIdentity;
use skyhold_order::{Confirmation, FlightSalesStats, Reservation, SweepOptions, SweepReport, Ticket};
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        // Inventory
        .route("/v1/admin/seat-offers", post(configure_seat))
        .route("/v1/admin/seat-offers/{id}", delete(deactivate_seat))
        .route("/v1/admin/flights/{id}/configure", post(mark_configured))
        // Sales
        .route("/v1/admin/flights/{id}/stats", get(flight_stats))
        .route("/v1/admin/flights/{id}/reservations", get(flight_reservations))
        .route("/v1/admin/reservations/{id}/validate-payment", post(validate_payment))
        .route("/v1/admin/reservations/{id}", delete(delete_reservation))
        // Operations
        .route("/v1/admin/tickets/{id}/use", post(mark_ticket_used))
        .route("/v1/admin/sweep", post(run_sweep))
}

// ============================================================================
// Inventory
// ============================================================================

/// POST /v1/admin/seat-offers
async fn configure_seat(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Json(req): Json<ConfigureSeatRequest>,
) -> Result<Json<SeatOffer>, AppError> {
    Ok(Json(state.configuration.configure_seat(&admin, req).await?))
}

/// DELETE /v1/admin/seat-offers/{id}
async fn deactivate_seat(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.configuration.deactivate_seat(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/flights/{id}/configure
async fn mark_configured(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlightBookingConfig>, AppError> {
    Ok(Json(state.configuration.mark_configured(&admin, id).await?))
}

// ============================================================================
// Sales
// ============================================================================

/// GET /v1/admin/flights/{id}/stats
async fn flight_stats(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlightSalesStats>, AppError> {
    Ok(Json(state.engine.flight_stats(&admin, id).await?))
}

/// GET /v1/admin/flights/{id}/reservations
async fn flight_reservations(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    Ok(Json(state.engine.list_for_flight(&admin, id).await?))
}

/// POST /v1/admin/reservations/{id}/validate-payment
async fn validate_payment(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Confirmation>, AppError> {
    Ok(Json(state.engine.validate_payment(&admin, id).await?))
}

/// DELETE /v1/admin/reservations/{id}
async fn delete_reservation(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.delete(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Operations
// ============================================================================

/// POST /v1/admin/tickets/{id}/use
async fn mark_ticket_used(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.issuer.mark_used(id).await?))
}

/// POST /v1/admin/sweep
///
/// Runs the expiration sweep on demand, e.g. `{"dry_run": true}` to preview.
async fn run_sweep(
    State(state): State<AppState>,
    Extension(admin): Extension<PassengerIdentity>,
    Json(options): Json<SweepOptions>,
) -> Result<Json<SweepReport>, AppError> {
    info!("Manual sweep requested by {} (dry_run={})", admin.id, options.dry_run);
    Ok(Json(state.scheduler.run(&options).await?))
}
