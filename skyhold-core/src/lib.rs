pub mod clock;
pub mod codes;
pub mod events;
pub mod identity;
pub mod notification;
pub mod payment;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{IdentityProvider, PassengerIdentity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid price {0}: must be greater than zero")]
    InvalidPrice(i64),

    #[error("Seat {seat_number} does not belong to aircraft {aircraft_id}")]
    InvalidSeatForAircraft {
        seat_number: String,
        aircraft_id: Uuid,
    },

    #[error("Flight {0} is not open for booking")]
    FlightNotBookable(String),

    #[error("Flight {0} has already departed")]
    FlightDeparted(String),

    #[error("Seat {seat_number} is no longer available")]
    SeatUnavailable {
        seat_number: String,
        seat_offer_id: Uuid,
    },

    #[error("Passenger already holds an active reservation on flight {0}")]
    DuplicateReservation(String),

    #[error("Reservation {0} is already paid")]
    AlreadyPaid(String),

    #[error("Reservation {0} is paid and cannot be cancelled")]
    CannotCancelPaidReservation(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Payment deadline for reservation {code} passed at {deadline}")]
    ReservationExpired {
        code: String,
        deadline: DateTime<Utc>,
    },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// A generated reservation code or barcode collided with an existing one.
    #[error("Generated code {0} already exists")]
    DuplicateCode(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Identity verification failed: {0}")]
    IdentityError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal service error: {0}")]
    InternalError(String),
}

/// Coarse classification used by callers that only care about the category
/// of failure (HTTP mapping, sweep error tallies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Expiry,
    Payment,
    NotFound,
    Forbidden,
    Unauthenticated,
    Internal,
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_)
            | CoreError::InvalidPrice(_)
            | CoreError::InvalidSeatForAircraft { .. }
            | CoreError::FlightNotBookable(_)
            | CoreError::FlightDeparted(_) => ErrorKind::Validation,
            CoreError::SeatUnavailable { .. }
            | CoreError::DuplicateReservation(_)
            | CoreError::AlreadyPaid(_)
            | CoreError::CannotCancelPaidReservation(_)
            | CoreError::InvalidTransition { .. } => ErrorKind::Conflict,
            CoreError::ReservationExpired { .. } => ErrorKind::Expiry,
            CoreError::PaymentDeclined(_) => ErrorKind::Payment,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::IdentityError(_) => ErrorKind::Unauthenticated,
            CoreError::DuplicateCode(_) | CoreError::Storage(_) | CoreError::InternalError(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let taken = CoreError::SeatUnavailable {
            seat_number: "12A".to_string(),
            seat_offer_id: Uuid::new_v4(),
        };
        assert_eq!(taken.kind(), ErrorKind::Conflict);
        assert_eq!(taken.to_string(), "Seat 12A is no longer available");

        let expired = CoreError::ReservationExpired {
            code: "AB12CD34".to_string(),
            deadline: Utc::now(),
        };
        assert_eq!(expired.kind(), ErrorKind::Expiry);

        assert_eq!(CoreError::InvalidPrice(0).kind(), ErrorKind::Validation);
        assert_eq!(CoreError::not_found("Reservation", "X").kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::DuplicateCode("X".into()).kind(), ErrorKind::Internal);
    }
}
