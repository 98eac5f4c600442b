use async_trait::async_trait;
use skyhold_core::CoreResult;
use std::collections::HashSet;
use uuid::Uuid;

use crate::aircraft::{Aircraft, PhysicalSeat};
use crate::config::FlightBookingConfig;
use crate::flight::{Flight, FlightItinerary};
use crate::seat_offer::SeatOffer;

/// Storage port for reference data and seat inventory.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Persist a newly registered aircraft together with its generated seats.
    async fn save_aircraft(&self, aircraft: &Aircraft, seats: &[PhysicalSeat]) -> CoreResult<()>;

    async fn get_aircraft(&self, id: Uuid) -> CoreResult<Option<Aircraft>>;

    async fn get_physical_seat(&self, id: Uuid) -> CoreResult<Option<PhysicalSeat>>;

    async fn list_physical_seats(&self, aircraft_id: Uuid) -> CoreResult<Vec<PhysicalSeat>>;

    /// Insert or replace a flight and its legs.
    async fn save_itinerary(&self, itinerary: &FlightItinerary) -> CoreResult<()>;

    /// Flight with its active legs, ordered.
    async fn get_itinerary(&self, flight_id: Uuid) -> CoreResult<Option<FlightItinerary>>;

    /// Active flights, ordered by departure.
    async fn list_flights(&self) -> CoreResult<Vec<Flight>>;

    async fn get_booking_config(&self, flight_id: Uuid) -> CoreResult<Option<FlightBookingConfig>>;

    async fn save_booking_config(&self, config: &FlightBookingConfig) -> CoreResult<()>;

    /// Insert, or update the existing offer with the same
    /// (flight, physical seat, leg) key. Returns the stored row.
    async fn upsert_seat_offer(&self, offer: &SeatOffer) -> CoreResult<SeatOffer>;

    async fn get_seat_offer(&self, id: Uuid) -> CoreResult<Option<SeatOffer>>;

    /// Every offer of the flight, inactive ones included.
    async fn list_seat_offers(&self, flight_id: Uuid) -> CoreResult<Vec<SeatOffer>>;

    async fn set_seat_offer_active(&self, id: Uuid, active: bool) -> CoreResult<()>;

    /// Offers of the flight referenced by a selection whose reservation is
    /// still Created, HeldUnpaid or Confirmed.
    async fn held_seat_offer_ids(&self, flight_id: Uuid) -> CoreResult<HashSet<Uuid>>;
}
