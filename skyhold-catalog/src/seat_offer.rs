use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    Economy,
    Premium,
    Business,
    First,
}

impl SeatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Economy => "ECONOMY",
            SeatClass::Premium => "PREMIUM",
            SeatClass::Business => "BUSINESS",
            SeatClass::First => "FIRST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ECONOMY" => Some(SeatClass::Economy),
            "PREMIUM" => Some(SeatClass::Premium),
            "BUSINESS" => Some(SeatClass::Business),
            "FIRST" => Some(SeatClass::First),
            _ => None,
        }
    }
}

/// A physical seat put on sale for a flight, or for one leg of it.
/// Keyed by (flight, physical seat, leg).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatOffer {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub leg_id: Option<Uuid>,
    pub physical_seat_id: Uuid,
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub price_cents: i64,
    pub sellable: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatOffer {
    pub fn is_bookable(&self) -> bool {
        self.active && self.sellable
    }

    pub fn same_key(&self, flight_id: Uuid, physical_seat_id: Uuid, leg_id: Option<Uuid>) -> bool {
        self.flight_id == flight_id && self.physical_seat_id == physical_seat_id && self.leg_id == leg_id
    }
}

/// One cell of the seat selection grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMapEntry {
    #[serde(flatten)]
    pub offer: SeatOffer,
    pub available: bool,
}
