use skyhold_core::{Clock, CoreError, CoreResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::aircraft::seat_sort_key;
use crate::flight::{Flight, FlightItinerary};
use crate::repository::CatalogRepository;
use crate::seat_offer::{SeatMapEntry, SeatOffer};

/// Read side of seat inventory: what exists, what is configured, what is free.
pub struct InventoryCatalog {
    repo: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
}

impl InventoryCatalog {
    pub fn new(repo: Arc<dyn CatalogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn get_itinerary(&self, flight_id: Uuid) -> CoreResult<FlightItinerary> {
        self.repo
            .get_itinerary(flight_id)
            .await?
            .filter(|i| i.flight.active)
            .ok_or_else(|| CoreError::not_found("Flight", flight_id))
    }

    /// Flight must be active, configured for booking and not yet departed.
    pub async fn ensure_bookable(&self, flight_id: Uuid) -> CoreResult<FlightItinerary> {
        let itinerary = self.get_itinerary(flight_id).await?;
        let configured = self
            .repo
            .get_booking_config(flight_id)
            .await?
            .map(|c| c.configured)
            .unwrap_or(false);
        if !configured {
            return Err(CoreError::FlightNotBookable(itinerary.flight.code.clone()));
        }
        if itinerary.flight.has_departed(self.clock.now()) {
            return Err(CoreError::FlightDeparted(itinerary.flight.code.clone()));
        }
        Ok(itinerary)
    }

    /// Active, sellable offers of the flight (optionally one leg) that no
    /// open or confirmed reservation currently holds.
    pub async fn available_seats(&self, flight_id: Uuid, leg_id: Option<Uuid>) -> CoreResult<Vec<SeatOffer>> {
        Ok(self
            .seat_map(flight_id, leg_id)
            .await?
            .into_iter()
            .filter(|e| e.available)
            .map(|e| e.offer)
            .collect())
    }

    /// Every active offer with its availability, sorted by seat number.
    pub async fn seat_map(&self, flight_id: Uuid, leg_id: Option<Uuid>) -> CoreResult<Vec<SeatMapEntry>> {
        self.ensure_bookable(flight_id).await?;

        let held = self.repo.held_seat_offer_ids(flight_id).await?;
        let mut entries: Vec<SeatMapEntry> = self
            .repo
            .list_seat_offers(flight_id)
            .await?
            .into_iter()
            .filter(|o| o.active)
            .filter(|o| leg_id.is_none() || o.leg_id == leg_id)
            .map(|offer| SeatMapEntry {
                available: offer.sellable && !held.contains(&offer.id),
                offer,
            })
            .collect();

        entries.sort_by(|a, b| {
            (a.offer.leg_id, seat_sort_key(&a.offer.seat_number))
                .cmp(&(b.offer.leg_id, seat_sort_key(&b.offer.seat_number)))
        });
        Ok(entries)
    }

    /// Flights a customer may book right now.
    pub async fn list_bookable_flights(&self) -> CoreResult<Vec<Flight>> {
        let now = self.clock.now();
        let mut bookable = Vec::new();
        for flight in self.repo.list_flights().await? {
            if !flight.active || flight.has_departed(now) {
                continue;
            }
            let configured = self
                .repo
                .get_booking_config(flight.id)
                .await?
                .map(|c| c.configured)
                .unwrap_or(false);
            if configured {
                bookable.push(flight);
            }
        }
        Ok(bookable)
    }
}
