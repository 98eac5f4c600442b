use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyhold_core::{CoreError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

/// Stable machine-readable name for each domain failure.
fn error_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::Validation(_) => "VALIDATION_FAILED",
        CoreError::InvalidPrice(_) => "INVALID_PRICE",
        CoreError::InvalidSeatForAircraft { .. } => "INVALID_SEAT_FOR_AIRCRAFT",
        CoreError::FlightNotBookable(_) => "FLIGHT_NOT_BOOKABLE",
        CoreError::FlightDeparted(_) => "FLIGHT_DEPARTED",
        CoreError::SeatUnavailable { .. } => "SEAT_UNAVAILABLE",
        CoreError::DuplicateReservation(_) => "DUPLICATE_RESERVATION",
        CoreError::AlreadyPaid(_) => "ALREADY_PAID",
        CoreError::CannotCancelPaidReservation(_) => "CANNOT_CANCEL_PAID_RESERVATION",
        CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
        CoreError::ReservationExpired { .. } => "RESERVATION_EXPIRED",
        CoreError::PaymentDeclined(_) => "PAYMENT_DECLINED",
        CoreError::NotFound { .. } => "NOT_FOUND",
        CoreError::Forbidden(_) => "FORBIDDEN",
        CoreError::IdentityError(_) => "UNAUTHENTICATED",
        CoreError::DuplicateCode(_) | CoreError::Storage(_) | CoreError::InternalError(_) => "INTERNAL",
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Expiry => StatusCode::GONE,
        ErrorKind::Payment => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::Core(err) => match err.kind() {
                ErrorKind::Internal => {
                    tracing::error!("Internal Server Error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL",
                        "Internal Server Error".to_string(),
                    )
                }
                kind => (status_for(kind), error_code(&err), err.to_string()),
            },
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
