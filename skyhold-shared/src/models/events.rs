use uuid::Uuid;

pub const TOPIC_RESERVATIONS: &str = "skyhold.reservations";
pub const TOPIC_TICKETS: &str = "skyhold.tickets";
pub const TOPIC_NOTIFICATIONS: &str = "skyhold.notifications";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationCreatedEvent {
    pub reservation_id: Uuid,
    pub code: String,
    pub flight_id: Uuid,
    pub passenger_id: String,
    pub seat_numbers: Vec<String>,
    pub total_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationConfirmedEvent {
    pub reservation_id: Uuid,
    pub code: String,
    pub flight_id: Uuid,
    pub passenger_id: String,
    pub total_cents: i64,
    pub payment_method: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationCancelledEvent {
    pub reservation_id: Uuid,
    pub code: String,
    pub flight_id: Uuid,
    /// "PASSENGER", "PAYMENT_DEADLINE" or "DEPARTURE_WINDOW"
    pub reason: String,
    /// Free text supplied by the passenger, if any.
    #[serde(default)]
    pub note: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TicketIssuedEvent {
    pub ticket_id: Uuid,
    pub reservation_id: Uuid,
    pub barcode: String,
    pub timestamp: i64,
}

/// Outbound e-mail request, consumed by the mailer.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationNoticeEvent {
    pub reservation_id: Uuid,
    pub code: String,
    pub kind: String,
    pub recipient: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}
