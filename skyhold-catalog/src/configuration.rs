use serde::{Deserialize, Serialize};
use skyhold_core::{Clock, CoreError, CoreResult, PassengerIdentity};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FlightBookingConfig;
use crate::repository::CatalogRepository;
use crate::seat_offer::{SeatClass, SeatOffer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureSeatRequest {
    pub flight_id: Uuid,
    pub physical_seat_id: Uuid,
    pub leg_id: Option<Uuid>,
    pub seat_class: SeatClass,
    pub price_cents: i64,
    pub sellable: bool,
}

/// Administrative workflow that puts physical seats on sale for a flight
/// and opens the flight for booking.
pub struct SeatConfigurationManager {
    repo: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
}

impl SeatConfigurationManager {
    pub fn new(repo: Arc<dyn CatalogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Upsert the offer keyed by (flight, physical seat, leg).
    pub async fn configure_seat(&self, admin: &PassengerIdentity, req: ConfigureSeatRequest) -> CoreResult<SeatOffer> {
        admin.require_admin()?;
        if req.price_cents <= 0 {
            return Err(CoreError::InvalidPrice(req.price_cents));
        }

        let itinerary = self
            .repo
            .get_itinerary(req.flight_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Flight", req.flight_id))?;
        let aircraft_id = itinerary.aircraft_for(req.leg_id)?;

        let seat = self
            .repo
            .get_physical_seat(req.physical_seat_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| CoreError::not_found("Seat", req.physical_seat_id))?;
        if seat.aircraft_id != aircraft_id {
            return Err(CoreError::InvalidSeatForAircraft {
                seat_number: seat.number(),
                aircraft_id,
            });
        }

        let now = self.clock.now();
        let offer = SeatOffer {
            id: Uuid::new_v4(),
            flight_id: req.flight_id,
            leg_id: req.leg_id,
            physical_seat_id: seat.id,
            seat_number: seat.number(),
            seat_class: req.seat_class,
            price_cents: req.price_cents,
            sellable: req.sellable,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let stored = self.repo.upsert_seat_offer(&offer).await?;
        info!(
            "Seat {} on flight {} configured as {} at {} cents by {}",
            stored.seat_number,
            itinerary.flight.code,
            stored.seat_class.as_str(),
            stored.price_cents,
            admin.id
        );
        Ok(stored)
    }

    /// Soft-delete an offer. Existing selections keep referencing it.
    pub async fn deactivate_seat(&self, admin: &PassengerIdentity, seat_offer_id: Uuid) -> CoreResult<()> {
        admin.require_admin()?;
        self.repo
            .get_seat_offer(seat_offer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("SeatOffer", seat_offer_id))?;
        self.repo.set_seat_offer_active(seat_offer_id, false).await?;
        info!("Seat offer {} deactivated by {}", seat_offer_id, admin.id);
        Ok(())
    }

    /// Open the flight for booking. Repeating the call refreshes the seat
    /// counts and re-stamps the configurer and timestamp.
    pub async fn mark_configured(&self, admin: &PassengerIdentity, flight_id: Uuid) -> CoreResult<FlightBookingConfig> {
        admin.require_admin()?;
        let itinerary = self
            .repo
            .get_itinerary(flight_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Flight", flight_id))?;
        itinerary.validate()?;

        let offers = self.repo.list_seat_offers(flight_id).await?;
        let mut config = self
            .repo
            .get_booking_config(flight_id)
            .await?
            .unwrap_or_else(|| FlightBookingConfig::unconfigured(flight_id));
        config.recount(&offers);

        // Only the first opening needs something to sell.
        if !config.configured && config.enabled_seat_count == 0 {
            return Err(CoreError::Validation(format!(
                "flight {} has no sellable seats configured",
                itinerary.flight.code
            )));
        }

        if config.configured {
            debug!(
                "Flight {} configuration refreshed: {} of {} seats sellable",
                itinerary.flight.code, config.enabled_seat_count, config.configured_seat_count
            );
        } else {
            info!(
                "Flight {} opened for booking with {} sellable seats",
                itinerary.flight.code, config.enabled_seat_count
            );
        }
        config.configured = true;
        config.configured_by = Some(admin.id.clone());
        config.configured_at = Some(self.clock.now());
        self.repo.save_booking_config(&config).await?;
        Ok(config)
    }
}
