use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use skyhold_core::payment::PaymentRequest;
use skyhold_core::PassengerIdentity;
use skyhold_order::{Confirmation, CreateReservation, Reservation};
use uuid::Uuid;

use crate::{documents::attachment, error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AttachSeatsRequest {
    pub seat_offer_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Whole hours left to pay; negative once the deadline has passed.
    pub hours_to_deadline: i64,
}

impl ReservationResponse {
    fn new(state: &AppState, reservation: Reservation) -> Self {
        Self {
            hours_to_deadline: reservation.hours_to_deadline(state.clock.now()),
            reservation,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation).get(list_reservations))
        .route("/v1/reservations/code/{code}", get(find_by_code))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route("/v1/reservations/{id}/seats", post(attach_seats))
        .route("/v1/reservations/{id}/hold", post(hold_unpaid))
        .route("/v1/reservations/{id}/pay", post(pay))
        .route("/v1/reservations/{id}/cancel", post(cancel))
        .route("/v1/reservations/{id}/document", get(download))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/reservations
async fn create_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Json(req): Json<CreateReservation>,
) -> Result<(StatusCode, Json<ReservationResponse>), AppError> {
    let reservation = state.engine.create(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(ReservationResponse::new(&state, reservation))))
}

/// GET /v1/reservations
async fn list_reservations(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
) -> Result<Json<Vec<ReservationResponse>>, AppError> {
    let reservations = state.engine.list_mine(&caller).await?;
    Ok(Json(
        reservations
            .into_iter()
            .map(|r| ReservationResponse::new(&state, r))
            .collect(),
    ))
}

/// GET /v1/reservations/{id}
async fn get_reservation(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.get(&caller, id).await?;
    Ok(Json(ReservationResponse::new(&state, reservation)))
}

/// GET /v1/reservations/code/{code}
async fn find_by_code(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(code): Path<String>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.find_by_code(&caller, &code).await?;
    Ok(Json(ReservationResponse::new(&state, reservation)))
}

/// POST /v1/reservations/{id}/seats
async fn attach_seats(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachSeatsRequest>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.attach_seats(&caller, id, req.seat_offer_ids).await?;
    Ok(Json(ReservationResponse::new(&state, reservation)))
}

/// POST /v1/reservations/{id}/hold
async fn hold_unpaid(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.engine.hold_unpaid(&caller, id).await?;
    Ok(Json(ReservationResponse::new(&state, reservation)))
}

/// POST /v1/reservations/{id}/pay
async fn pay(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<Confirmation>, AppError> {
    Ok(Json(state.engine.pay(&caller, id, req).await?))
}

/// POST /v1/reservations/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reason = body.and_then(|Json(req)| req.reason);
    let reservation = state.engine.cancel(&caller, id, reason).await?;
    Ok(Json(ReservationResponse::new(&state, reservation)))
}

/// GET /v1/reservations/{id}/document
async fn download(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let reservation = state.engine.get(&caller, id).await?;
    let itinerary = state.inventory.get_itinerary(reservation.flight_id).await?;
    let doc = state.documents.render_reservation(&reservation, &itinerary)?;
    Ok(attachment(doc))
}
