use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyhold_catalog::{CatalogRepository, FlightItinerary, SeatClass};
use skyhold_core::codes::{self, MAX_CODE_ATTEMPTS};
use skyhold_core::{Clock, CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::models::{Reservation, Ticket};
use crate::repository::TicketRepository;

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightSnapshot {
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub has_legs: bool,
    pub aircraft: Option<String>,
    pub legs: Vec<LegSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegSnapshot {
    pub leg_order: i32,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub aircraft: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatSnapshot {
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub price_cents: i64,
    pub aircraft: Option<String>,
    pub leg_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerSnapshot {
    pub passenger_id: String,
    pub full_name: String,
    pub email: String,
}

// ============================================================================
// Issuer
// ============================================================================

/// Turns confirmed reservations into tickets, exactly once each.
pub struct TicketIssuer {
    tickets: Arc<dyn TicketRepository>,
    catalog: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
}

impl TicketIssuer {
    pub fn new(tickets: Arc<dyn TicketRepository>, catalog: Arc<dyn CatalogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { tickets, catalog, clock }
    }

    /// Idempotent: a reservation that already has a ticket gets it back.
    pub async fn issue(&self, reservation: &Reservation) -> CoreResult<Ticket> {
        if reservation.status != ReservationStatus::Confirmed {
            return Err(CoreError::InvalidTransition {
                from: reservation.status.to_string(),
                to: "TICKETED".to_string(),
            });
        }
        if let Some(existing) = self.tickets.find_by_reservation(reservation.id).await? {
            return Ok(existing);
        }

        let itinerary = self
            .catalog
            .get_itinerary(reservation.flight_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Flight", reservation.flight_id))?;
        let registrations = self.aircraft_registrations(&itinerary).await?;

        let flight_snapshot = serde_json::to_value(flight_snapshot(&itinerary, &registrations))
            .map_err(|e| CoreError::InternalError(e.to_string()))?;
        let seat_snapshot = serde_json::to_value(seat_snapshot(reservation, &itinerary, &registrations))
            .map_err(|e| CoreError::InternalError(e.to_string()))?;
        let passenger_snapshot = serde_json::to_value(PassengerSnapshot {
            passenger_id: reservation.passenger_id.clone(),
            full_name: reservation.passenger_name.clone(),
            email: reservation.passenger_email.expose().clone(),
        })
        .map_err(|e| CoreError::InternalError(e.to_string()))?;

        let issued_at = self.clock.now();
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let ticket = Ticket {
                id: Uuid::new_v4(),
                reservation_id: reservation.id,
                barcode: codes::barcode(),
                flight_snapshot: flight_snapshot.clone(),
                seat_snapshot: seat_snapshot.clone(),
                passenger_snapshot: passenger_snapshot.clone(),
                issued_at,
                used: false,
                used_at: None,
            };
            match self.tickets.insert_if_absent(&ticket).await {
                Ok(stored) => {
                    if stored.id == ticket.id {
                        info!("Ticket {} issued for reservation {}", stored.barcode, reservation.code);
                    }
                    return Ok(stored);
                }
                Err(CoreError::DuplicateCode(code)) => {
                    warn!("Barcode collision on {} (attempt {})", code, attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::InternalError(format!(
            "could not allocate a unique barcode for reservation {}",
            reservation.code
        )))
    }

    pub async fn get(&self, ticket_id: Uuid) -> CoreResult<Ticket> {
        self.tickets
            .get(ticket_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Ticket", ticket_id))
    }

    pub async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<Ticket>> {
        self.tickets.find_by_reservation(reservation_id).await
    }

    /// Public lookup: the barcode is trimmed and upper-cased first.
    pub async fn find_by_barcode(&self, raw: &str, min_len: usize) -> CoreResult<Ticket> {
        let barcode = codes::normalize_lookup_code(raw, min_len)?;
        self.tickets
            .find_by_barcode(&barcode)
            .await?
            .ok_or_else(|| CoreError::not_found("Ticket", barcode))
    }

    /// Boarding scan. Repeated scans return the ticket unchanged.
    pub async fn mark_used(&self, ticket_id: Uuid) -> CoreResult<Ticket> {
        let ticket = self
            .tickets
            .mark_used(ticket_id, self.clock.now())
            .await?
            .ok_or_else(|| CoreError::not_found("Ticket", ticket_id))?;
        info!("Ticket {} marked as used", ticket.barcode);
        Ok(ticket)
    }

    async fn aircraft_registrations(&self, itinerary: &FlightItinerary) -> CoreResult<HashMap<Uuid, String>> {
        let ids = itinerary
            .flight
            .aircraft_id
            .into_iter()
            .chain(itinerary.legs.iter().map(|l| l.aircraft_id));
        let mut registrations = HashMap::new();
        for id in ids {
            if registrations.contains_key(&id) {
                continue;
            }
            if let Some(aircraft) = self.catalog.get_aircraft(id).await? {
                registrations.insert(id, aircraft.registration);
            }
        }
        Ok(registrations)
    }
}

fn flight_snapshot(itinerary: &FlightItinerary, registrations: &HashMap<Uuid, String>) -> FlightSnapshot {
    let flight = &itinerary.flight;
    FlightSnapshot {
        code: flight.code.clone(),
        origin: flight.origin.clone(),
        destination: flight.destination.clone(),
        departure_at: flight.departure_at,
        arrival_at: flight.arrival_at,
        has_legs: itinerary.has_legs(),
        aircraft: flight.aircraft_id.and_then(|id| registrations.get(&id).cloned()),
        legs: itinerary
            .legs
            .iter()
            .map(|leg| LegSnapshot {
                leg_order: leg.leg_order,
                origin: leg.origin.clone(),
                destination: leg.destination.clone(),
                departure_at: leg.departure_at,
                arrival_at: leg.arrival_at,
                aircraft: registrations
                    .get(&leg.aircraft_id)
                    .cloned()
                    .unwrap_or_else(|| leg.aircraft_id.to_string()),
            })
            .collect(),
    }
}

fn seat_snapshot(
    reservation: &Reservation,
    itinerary: &FlightItinerary,
    registrations: &HashMap<Uuid, String>,
) -> Vec<SeatSnapshot> {
    reservation
        .selections
        .iter()
        .map(|s| {
            let leg = s.leg_id.and_then(|id| itinerary.leg(id));
            let aircraft_id = leg.map(|l| l.aircraft_id).or(itinerary.flight.aircraft_id);
            SeatSnapshot {
                seat_number: s.seat_number.clone(),
                seat_class: s.seat_class,
                price_cents: s.price_cents,
                aircraft: aircraft_id.and_then(|id| registrations.get(&id).cloned()),
                leg_order: leg.map(|l| l.leg_order),
            }
        })
        .collect()
}
