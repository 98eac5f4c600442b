//! Process-local implementation of every storage port.
//!
//! A single async mutex guards the whole state, so each repository call is
//! one serializable unit, the same guarantee the Postgres store gets from
//! row locks inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_catalog::{
    Aircraft, CatalogRepository, Flight, FlightBookingConfig, FlightItinerary, FlightLeg, PhysicalSeat, SeatOffer,
};
use skyhold_core::{CoreError, CoreResult};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::models::{Reservation, SeatSelection, Ticket};
use crate::repository::{ReservationDraft, ReservationRepository, StatusChange, SweepCandidate, TicketRepository};

#[derive(Default)]
struct MemoryState {
    aircraft: HashMap<Uuid, Aircraft>,
    seats: HashMap<Uuid, PhysicalSeat>,
    flights: HashMap<Uuid, Flight>,
    legs: HashMap<Uuid, FlightLeg>,
    configs: HashMap<Uuid, FlightBookingConfig>,
    offers: HashMap<Uuid, SeatOffer>,
    reservations: HashMap<Uuid, Reservation>,
    tickets: HashMap<Uuid, Ticket>,
}

impl MemoryState {
    fn held_offer_ids(&self) -> HashSet<Uuid> {
        self.reservations
            .values()
            .filter(|r| r.holds_seats())
            .flat_map(|r| r.selections.iter().map(|s| s.seat_offer_id))
            .collect()
    }

    fn flight_code(&self, flight_id: Uuid) -> String {
        self.flights
            .get(&flight_id)
            .map(|f| f.code.clone())
            .unwrap_or_else(|| flight_id.to_string())
    }

    /// Check every requested offer under the lock and build the selections.
    fn select_seats(
        &self,
        flight_id: Uuid,
        seat_offer_ids: &[Uuid],
        reservation_id: Uuid,
        at: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatSelection>> {
        let held = self.held_offer_ids();
        let mut sorted = seat_offer_ids.to_vec();
        sorted.sort();

        let mut selections = Vec::with_capacity(sorted.len());
        for id in sorted {
            let offer = self
                .offers
                .get(&id)
                .filter(|o| o.flight_id == flight_id)
                .ok_or_else(|| CoreError::Validation(format!("seat offer {} is not part of this flight", id)))?;
            if !offer.is_bookable() || held.contains(&id) {
                return Err(CoreError::SeatUnavailable {
                    seat_number: offer.seat_number.clone(),
                    seat_offer_id: id,
                });
            }
            selections.push(SeatSelection {
                id: Uuid::new_v4(),
                reservation_id,
                seat_offer_id: id,
                leg_id: offer.leg_id,
                seat_number: offer.seat_number.clone(),
                seat_class: offer.seat_class,
                price_cents: offer.price_cents,
                created_at: at,
            });
        }
        Ok(selections)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn save_aircraft(&self, aircraft: &Aircraft, seats: &[PhysicalSeat]) -> CoreResult<()> {
        let mut st = self.state.lock().await;
        if st
            .aircraft
            .values()
            .any(|a| a.registration == aircraft.registration && a.id != aircraft.id)
        {
            return Err(CoreError::Validation(format!(
                "aircraft {} is already registered",
                aircraft.registration
            )));
        }
        st.aircraft.insert(aircraft.id, aircraft.clone());
        for seat in seats {
            st.seats.insert(seat.id, seat.clone());
        }
        Ok(())
    }

    async fn get_aircraft(&self, id: Uuid) -> CoreResult<Option<Aircraft>> {
        Ok(self.state.lock().await.aircraft.get(&id).cloned())
    }

    async fn get_physical_seat(&self, id: Uuid) -> CoreResult<Option<PhysicalSeat>> {
        Ok(self.state.lock().await.seats.get(&id).cloned())
    }

    async fn list_physical_seats(&self, aircraft_id: Uuid) -> CoreResult<Vec<PhysicalSeat>> {
        let st = self.state.lock().await;
        let mut seats: Vec<PhysicalSeat> = st.seats.values().filter(|s| s.aircraft_id == aircraft_id).cloned().collect();
        seats.sort_by_key(|s| (s.row, s.column));
        Ok(seats)
    }

    async fn save_itinerary(&self, itinerary: &FlightItinerary) -> CoreResult<()> {
        let mut st = self.state.lock().await;
        let flight = &itinerary.flight;
        if st.flights.values().any(|f| f.code == flight.code && f.id != flight.id) {
            return Err(CoreError::Validation(format!("flight code {} already exists", flight.code)));
        }
        st.flights.insert(flight.id, flight.clone());
        st.legs.retain(|_, l| l.flight_id != flight.id);
        for leg in &itinerary.legs {
            st.legs.insert(leg.id, leg.clone());
        }
        Ok(())
    }

    async fn get_itinerary(&self, flight_id: Uuid) -> CoreResult<Option<FlightItinerary>> {
        let st = self.state.lock().await;
        Ok(st.flights.get(&flight_id).map(|flight| {
            let legs = st.legs.values().filter(|l| l.flight_id == flight_id).cloned().collect();
            FlightItinerary::with_legs(flight.clone(), legs)
        }))
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let st = self.state.lock().await;
        let mut flights: Vec<Flight> = st.flights.values().filter(|f| f.active).cloned().collect();
        flights.sort_by_key(|f| f.departure_at);
        Ok(flights)
    }

    async fn get_booking_config(&self, flight_id: Uuid) -> CoreResult<Option<FlightBookingConfig>> {
        Ok(self.state.lock().await.configs.get(&flight_id).cloned())
    }

    async fn save_booking_config(&self, config: &FlightBookingConfig) -> CoreResult<()> {
        self.state.lock().await.configs.insert(config.flight_id, config.clone());
        Ok(())
    }

    async fn upsert_seat_offer(&self, offer: &SeatOffer) -> CoreResult<SeatOffer> {
        let mut st = self.state.lock().await;
        if let Some(existing) = st
            .offers
            .values_mut()
            .find(|o| o.same_key(offer.flight_id, offer.physical_seat_id, offer.leg_id))
        {
            existing.seat_class = offer.seat_class;
            existing.price_cents = offer.price_cents;
            existing.sellable = offer.sellable;
            existing.active = true;
            existing.updated_at = offer.updated_at;
            return Ok(existing.clone());
        }
        st.offers.insert(offer.id, offer.clone());
        Ok(offer.clone())
    }

    async fn get_seat_offer(&self, id: Uuid) -> CoreResult<Option<SeatOffer>> {
        Ok(self.state.lock().await.offers.get(&id).cloned())
    }

    async fn list_seat_offers(&self, flight_id: Uuid) -> CoreResult<Vec<SeatOffer>> {
        let st = self.state.lock().await;
        Ok(st.offers.values().filter(|o| o.flight_id == flight_id).cloned().collect())
    }

    async fn set_seat_offer_active(&self, id: Uuid, active: bool) -> CoreResult<()> {
        let mut st = self.state.lock().await;
        let offer = st.offers.get_mut(&id).ok_or_else(|| CoreError::not_found("SeatOffer", id))?;
        offer.active = active;
        offer.updated_at = Utc::now();
        Ok(())
    }

    async fn held_seat_offer_ids(&self, flight_id: Uuid) -> CoreResult<HashSet<Uuid>> {
        let st = self.state.lock().await;
        Ok(st
            .reservations
            .values()
            .filter(|r| r.flight_id == flight_id && r.holds_seats())
            .flat_map(|r| r.selections.iter().map(|s| s.seat_offer_id))
            .collect())
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn create_reservation(&self, draft: ReservationDraft) -> CoreResult<Reservation> {
        let mut st = self.state.lock().await;

        if st.reservations.values().any(|r| r.code == draft.code) {
            return Err(CoreError::DuplicateCode(draft.code));
        }
        if draft.single_active_per_flight
            && st
                .reservations
                .values()
                .any(|r| r.passenger_id == draft.passenger_id && r.flight_id == draft.flight_id && r.holds_seats())
        {
            return Err(CoreError::DuplicateReservation(st.flight_code(draft.flight_id)));
        }

        let selections = st.select_seats(draft.flight_id, &draft.seat_offer_ids, draft.id, draft.created_at)?;

        let mut reservation = Reservation {
            id: draft.id,
            code: draft.code,
            flight_id: draft.flight_id,
            passenger_id: draft.passenger_id,
            passenger_name: draft.passenger_name,
            passenger_email: draft.passenger_email,
            status: ReservationStatus::Created,
            selections,
            total_cents: 0,
            payment_deadline: draft.payment_deadline,
            reminder_sent: false,
            reminder_sent_at: None,
            active: true,
            payment: None,
            paid_at: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        reservation.recompute_total();
        st.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn attach_seats(&self, reservation_id: Uuid, seat_offer_ids: &[Uuid], at: DateTime<Utc>) -> CoreResult<Reservation> {
        let mut st = self.state.lock().await;
        let (flight_id, status) = st
            .reservations
            .get(&reservation_id)
            .filter(|r| r.active)
            .map(|r| (r.flight_id, r.status))
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?;
        if status != ReservationStatus::Created {
            return Err(CoreError::InvalidTransition {
                from: status.to_string(),
                to: ReservationStatus::Created.to_string(),
            });
        }

        let selections = st.select_seats(flight_id, seat_offer_ids, reservation_id, at)?;
        let reservation = st
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?;
        for selection in selections {
            reservation.add_selection(selection);
        }
        reservation.updated_at = at;
        Ok(reservation.clone())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> CoreResult<Option<Reservation>> {
        let st = self.state.lock().await;
        Ok(st.reservations.values().find(|r| r.code == code).cloned())
    }

    async fn list_for_passenger(&self, passenger_id: &str) -> CoreResult<Vec<Reservation>> {
        let st = self.state.lock().await;
        let mut list: Vec<Reservation> = st
            .reservations
            .values()
            .filter(|r| r.passenger_id == passenger_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let st = self.state.lock().await;
        Ok(st.reservations.values().filter(|r| r.flight_id == flight_id).cloned().collect())
    }

    async fn apply_status(&self, id: Uuid, change: StatusChange) -> CoreResult<Option<Reservation>> {
        let mut st = self.state.lock().await;
        let reservation = match st.reservations.get_mut(&id) {
            Some(r) => r,
            None => return Ok(None),
        };
        if !change.expected.contains(&reservation.status) {
            return Ok(None);
        }
        reservation.status = change.to;
        reservation.active = change.active;
        reservation.updated_at = change.at;
        if let Some(receipt) = change.payment {
            reservation.paid_at = Some(receipt.processed_at);
            reservation.payment = Some(receipt);
        }
        Ok(Some(reservation.clone()))
    }

    async fn delete(&self, id: Uuid, expected: Option<&[ReservationStatus]>) -> CoreResult<bool> {
        let mut st = self.state.lock().await;
        let allowed = match (st.reservations.get(&id), expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(r), Some(statuses)) => statuses.contains(&r.status),
        };
        if allowed {
            st.reservations.remove(&id);
            st.tickets.retain(|_, t| t.reservation_id != id);
        }
        Ok(allowed)
    }

    async fn claim_reminder(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let mut st = self.state.lock().await;
        match st.reservations.get_mut(&id) {
            Some(r) if !r.reminder_sent && r.status.is_open() => {
                r.reminder_sent = true;
                r.reminder_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_reminder(&self, id: Uuid) -> CoreResult<()> {
        let mut st = self.state.lock().await;
        if let Some(r) = st.reservations.get_mut(&id) {
            r.reminder_sent = false;
            r.reminder_sent_at = None;
        }
        Ok(())
    }

    async fn sweep_candidates(
        &self,
        departing_after: DateTime<Utc>,
        limit: usize,
        code: Option<&str>,
    ) -> CoreResult<Vec<SweepCandidate>> {
        let st = self.state.lock().await;
        let mut candidates: Vec<SweepCandidate> = st
            .reservations
            .values()
            .filter(|r| r.active && r.status.is_open())
            .filter(|r| code.map_or(true, |c| r.code == c))
            .filter_map(|r| {
                let flight = st.flights.get(&r.flight_id)?;
                (flight.departure_at > departing_after).then(|| SweepCandidate {
                    reservation: r.clone(),
                    flight_code: flight.code.clone(),
                    departure_at: flight.departure_at,
                })
            })
            .collect();
        candidates.sort_by_key(|c| (c.departure_at, c.reservation.created_at));
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn insert_if_absent(&self, ticket: &Ticket) -> CoreResult<Ticket> {
        let mut st = self.state.lock().await;
        if let Some(existing) = st.tickets.values().find(|t| t.reservation_id == ticket.reservation_id) {
            return Ok(existing.clone());
        }
        if st.tickets.values().any(|t| t.barcode == ticket.barcode) {
            return Err(CoreError::DuplicateCode(ticket.barcode.clone()));
        }
        st.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket.clone())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Ticket>> {
        Ok(self.state.lock().await.tickets.get(&id).cloned())
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<Ticket>> {
        let st = self.state.lock().await;
        Ok(st.tickets.values().find(|t| t.reservation_id == reservation_id).cloned())
    }

    async fn find_by_barcode(&self, barcode: &str) -> CoreResult<Option<Ticket>> {
        let st = self.state.lock().await;
        Ok(st.tickets.values().find(|t| t.barcode == barcode).cloned())
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Ticket>> {
        let mut st = self.state.lock().await;
        Ok(st.tickets.get_mut(&id).map(|t| {
            t.mark_used(at);
            t.clone()
        }))
    }
}
