use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::seat_offer::SeatOffer;

/// Booking visibility switch for a flight. Customers never see a flight
/// until an administrator flips `configured`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightBookingConfig {
    pub flight_id: Uuid,
    pub configured: bool,
    pub configured_by: Option<String>,
    pub configured_at: Option<DateTime<Utc>>,
    pub configured_seat_count: i32,
    pub enabled_seat_count: i32,
}

impl FlightBookingConfig {
    pub fn unconfigured(flight_id: Uuid) -> Self {
        Self {
            flight_id,
            configured: false,
            configured_by: None,
            configured_at: None,
            configured_seat_count: 0,
            enabled_seat_count: 0,
        }
    }

    /// Active offers count as configured; active and sellable ones as enabled.
    pub fn recount(&mut self, offers: &[SeatOffer]) {
        self.configured_seat_count = offers.iter().filter(|o| o.active).count() as i32;
        self.enabled_seat_count = offers.iter().filter(|o| o.is_bookable()).count() as i32;
    }
}
