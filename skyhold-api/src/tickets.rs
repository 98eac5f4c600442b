use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use skyhold_core::PassengerIdentity;
use skyhold_order::Ticket;
use uuid::Uuid;

use crate::{documents::attachment, error::AppError, state::AppState};

/// What a gate scanner sees. Passenger contact details stay out.
#[derive(Debug, Serialize)]
pub struct TicketVerification {
    pub barcode: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub flight: Value,
    pub seats: Value,
}

impl From<Ticket> for TicketVerification {
    fn from(ticket: Ticket) -> Self {
        Self {
            barcode: ticket.barcode,
            used: ticket.used,
            used_at: ticket.used_at,
            issued_at: ticket.issued_at,
            flight: ticket.flight_snapshot,
            seats: ticket.seat_snapshot,
        }
    }
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/v1/tickets/barcode/{barcode}", get(verify_barcode))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tickets/{id}", get(get_ticket))
        .route("/v1/tickets/{id}/document", get(download))
}

/// GET /v1/tickets/barcode/{barcode}
async fn verify_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<TicketVerification>, AppError> {
    let ticket = state
        .issuer
        .find_by_barcode(&barcode, state.business_rules.min_lookup_len)
        .await?;
    Ok(Json(ticket.into()))
}

/// GET /v1/tickets/{id}
async fn get_ticket(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.engine.get_ticket(&caller, id).await?))
}

/// GET /v1/tickets/{id}/document
async fn download(
    State(state): State<AppState>,
    Extension(caller): Extension<PassengerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state.engine.get_ticket(&caller, id).await?;
    let doc = state.documents.render_ticket(&ticket)?;
    Ok(attachment(doc))
}
