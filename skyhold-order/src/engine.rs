use chrono::Duration;
use serde::{Deserialize, Serialize};
use skyhold_catalog::{CatalogRepository, InventoryCatalog};
use skyhold_core::codes::{self, MAX_CODE_ATTEMPTS, MIN_LOOKUP_LEN};
use skyhold_core::events::EventPublisher;
use skyhold_core::payment::{PaymentAdapter, PaymentMethod, PaymentReceipt, PaymentRequest};
use skyhold_core::{Clock, CoreError, CoreResult, PassengerIdentity};
use skyhold_shared::models::events::{
    ReservationCancelledEvent, ReservationConfirmedEvent, ReservationCreatedEvent, TOPIC_RESERVATIONS,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::fulfillment::TicketIssuer;
use crate::lifecycle::ReservationStatus;
use crate::models::{Reservation, Ticket};
use crate::repository::{ReservationDraft, ReservationRepository, StatusChange};
use crate::stats::FlightSalesStats;

#[derive(Debug, Clone)]
pub struct ReservationRules {
    /// Payment deadline = departure - payment_window.
    pub payment_window: Duration,
    pub single_active_per_flight: bool,
    pub min_lookup_len: usize,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            payment_window: Duration::hours(72),
            single_active_per_flight: true,
            min_lookup_len: MIN_LOOKUP_LEN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservation {
    pub flight_id: Uuid,
    pub seat_offer_ids: Vec<Uuid>,
}

/// Result of a successful payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub reservation: Reservation,
    pub ticket: Ticket,
}

/// Entry point for every reservation state change.
pub struct ReservationEngine {
    inventory: Arc<InventoryCatalog>,
    catalog: Arc<dyn CatalogRepository>,
    reservations: Arc<dyn ReservationRepository>,
    issuer: Arc<TicketIssuer>,
    payments: Arc<dyn PaymentAdapter>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    rules: ReservationRules,
}

impl ReservationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inventory: Arc<InventoryCatalog>,
        catalog: Arc<dyn CatalogRepository>,
        reservations: Arc<dyn ReservationRepository>,
        issuer: Arc<TicketIssuer>,
        payments: Arc<dyn PaymentAdapter>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        rules: ReservationRules,
    ) -> Self {
        Self {
            inventory,
            catalog,
            reservations,
            issuer,
            payments,
            events,
            clock,
            rules,
        }
    }

    pub fn rules(&self) -> &ReservationRules {
        &self.rules
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a reservation holding `seat_offer_ids`. Either every seat is
    /// taken for this passenger or nothing is written.
    pub async fn create(&self, passenger: &PassengerIdentity, req: CreateReservation) -> CoreResult<Reservation> {
        let seat_offer_ids = normalize_seat_ids(req.seat_offer_ids)?;
        let itinerary = self.inventory.ensure_bookable(req.flight_id).await?;

        let now = self.clock.now();
        let payment_deadline = Reservation::deadline_for(itinerary.flight.departure_at, self.rules.payment_window);
        if now >= payment_deadline {
            return Err(CoreError::FlightNotBookable(format!(
                "{} (reservations closed at {})",
                itinerary.flight.code, payment_deadline
            )));
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let draft = ReservationDraft {
                id: Uuid::new_v4(),
                code: codes::reservation_code(),
                flight_id: req.flight_id,
                passenger_id: passenger.id.clone(),
                passenger_name: passenger.display_name.clone(),
                passenger_email: passenger.email.clone(),
                seat_offer_ids: seat_offer_ids.clone(),
                payment_deadline,
                single_active_per_flight: self.rules.single_active_per_flight,
                created_at: now,
            };
            match self.reservations.create_reservation(draft).await {
                Ok(reservation) => {
                    info!(
                        "Reservation {} created on flight {} for seats {:?} ({} cents)",
                        reservation.code,
                        itinerary.flight.code,
                        reservation.seat_numbers(),
                        reservation.total_cents
                    );
                    self.publish(
                        &reservation.code,
                        &ReservationCreatedEvent {
                            reservation_id: reservation.id,
                            code: reservation.code.clone(),
                            flight_id: reservation.flight_id,
                            passenger_id: reservation.passenger_id.clone(),
                            seat_numbers: reservation.seat_numbers(),
                            total_cents: reservation.total_cents,
                            timestamp: now.timestamp(),
                        },
                    )
                    .await;
                    return Ok(reservation);
                }
                Err(CoreError::DuplicateCode(code)) => {
                    warn!("Reservation code collision on {} (attempt {})", code, attempt);
                }
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::InternalError("could not allocate a unique reservation code".to_string()))
    }

    /// Add seats to a reservation that is still Created.
    pub async fn attach_seats(
        &self,
        passenger: &PassengerIdentity,
        reservation_id: Uuid,
        seat_offer_ids: Vec<Uuid>,
    ) -> CoreResult<Reservation> {
        let seat_offer_ids = normalize_seat_ids(seat_offer_ids)?;
        let reservation = self.get(passenger, reservation_id).await?;
        self.inventory.ensure_bookable(reservation.flight_id).await?;

        let updated = self
            .reservations
            .attach_seats(reservation_id, &seat_offer_ids, self.clock.now())
            .await?;
        info!(
            "Reservation {} now holds {:?} ({} cents)",
            updated.code,
            updated.seat_numbers(),
            updated.total_cents
        );
        Ok(updated)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// "Pay later": Created -> HeldUnpaid, allowed until the payment deadline.
    pub async fn hold_unpaid(&self, passenger: &PassengerIdentity, reservation_id: Uuid) -> CoreResult<Reservation> {
        let reservation = self.get(passenger, reservation_id).await?;
        reservation.status.transition(ReservationStatus::HeldUnpaid)?;

        let now = self.clock.now();
        if !reservation.is_payable_at(now) {
            return Err(CoreError::ReservationExpired {
                code: reservation.code.clone(),
                deadline: reservation.payment_deadline,
            });
        }

        let change = StatusChange::new(&[ReservationStatus::Created], ReservationStatus::HeldUnpaid, now);
        let held = self.apply_or_explain(&reservation, change).await?;
        info!(
            "Reservation {} held unpaid until {}",
            held.code, held.payment_deadline
        );
        Ok(held)
    }

    /// Charge the passenger and confirm. Issues the ticket.
    pub async fn pay(
        &self,
        passenger: &PassengerIdentity,
        reservation_id: Uuid,
        request: PaymentRequest,
    ) -> CoreResult<Confirmation> {
        let reservation = self.get(passenger, reservation_id).await?;
        let now = self.clock.now();
        self.ensure_payable(&reservation)?;
        if !reservation.is_payable_at(now) {
            return Err(CoreError::ReservationExpired {
                code: reservation.code.clone(),
                deadline: reservation.payment_deadline,
            });
        }
        if request.method == PaymentMethod::Manual {
            return Err(CoreError::Forbidden("manual payments are validated by an administrator".to_string()));
        }

        let receipt = self
            .payments
            .charge(&reservation.code, reservation.total_cents, &request, now)
            .await?;
        self.confirm(reservation, receipt).await
    }

    /// Administrator confirms a payment received outside the gateway.
    /// The payment deadline does not apply.
    pub async fn validate_payment(&self, admin: &PassengerIdentity, reservation_id: Uuid) -> CoreResult<Confirmation> {
        admin.require_admin()?;
        let reservation = self.get(admin, reservation_id).await?;
        self.ensure_payable(&reservation)?;

        let now = self.clock.now();
        let receipt = PaymentReceipt {
            method: PaymentMethod::Manual,
            masked_card: None,
            reference: format!("MANUAL-{}-{}", reservation.code, admin.id),
            processed_at: now,
        };
        info!("Payment for reservation {} validated by {}", reservation.code, admin.id);
        self.confirm(reservation, receipt).await
    }

    /// Passenger cancellation. Selections are kept for the record; the seats
    /// become available because the reservation stops blocking.
    pub async fn cancel(
        &self,
        passenger: &PassengerIdentity,
        reservation_id: Uuid,
        note: Option<String>,
    ) -> CoreResult<Reservation> {
        let reservation = self.get(passenger, reservation_id).await?;
        if reservation.status == ReservationStatus::Confirmed {
            return Err(CoreError::CannotCancelPaidReservation(reservation.code.clone()));
        }
        reservation.status.transition(ReservationStatus::Cancelled)?;

        let now = self.clock.now();
        let change = StatusChange::new(&ReservationStatus::OPEN, ReservationStatus::Cancelled, now);
        let cancelled = self.apply_or_explain(&reservation, change).await?;
        info!(
            "Reservation {} cancelled by {} ({})",
            cancelled.code,
            passenger.id,
            note.as_deref().unwrap_or("no reason given")
        );
        self.publish(
            &cancelled.code,
            &ReservationCancelledEvent {
                reservation_id: cancelled.id,
                code: cancelled.code.clone(),
                flight_id: cancelled.flight_id,
                reason: "PASSENGER".to_string(),
                note,
                timestamp: now.timestamp(),
            },
        )
        .await;
        Ok(cancelled)
    }

    /// Hard delete, selections included. Administrative only.
    pub async fn delete(&self, admin: &PassengerIdentity, reservation_id: Uuid) -> CoreResult<()> {
        admin.require_admin()?;
        if !self.reservations.delete(reservation_id, None).await? {
            return Err(CoreError::not_found("Reservation", reservation_id));
        }
        info!("Reservation {} deleted by {}", reservation_id, admin.id);
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub async fn get(&self, caller: &PassengerIdentity, reservation_id: Uuid) -> CoreResult<Reservation> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?;
        authorize(caller, &reservation)?;
        Ok(reservation)
    }

    /// Code is trimmed and upper-cased, and must be at least the configured
    /// minimum length, before the store is queried.
    pub async fn find_by_code(&self, caller: &PassengerIdentity, raw_code: &str) -> CoreResult<Reservation> {
        let code = codes::normalize_lookup_code(raw_code, self.rules.min_lookup_len)?;
        let reservation = self
            .reservations
            .find_by_code(&code)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", &code))?;
        authorize(caller, &reservation)?;
        Ok(reservation)
    }

    pub async fn list_mine(&self, passenger: &PassengerIdentity) -> CoreResult<Vec<Reservation>> {
        self.reservations.list_for_passenger(&passenger.id).await
    }

    pub async fn list_for_flight(&self, admin: &PassengerIdentity, flight_id: Uuid) -> CoreResult<Vec<Reservation>> {
        admin.require_admin()?;
        self.reservations.list_for_flight(flight_id).await
    }

    /// Ticket visible to its owner and to administrators.
    pub async fn get_ticket(&self, caller: &PassengerIdentity, ticket_id: Uuid) -> CoreResult<Ticket> {
        let ticket = self.issuer.get(ticket_id).await?;
        self.get(caller, ticket.reservation_id).await?;
        Ok(ticket)
    }

    pub async fn flight_stats(&self, admin: &PassengerIdentity, flight_id: Uuid) -> CoreResult<FlightSalesStats> {
        admin.require_admin()?;
        let itinerary = self
            .catalog
            .get_itinerary(flight_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Flight", flight_id))?;
        let offers = self.catalog.list_seat_offers(flight_id).await?;
        let reservations = self.reservations.list_for_flight(flight_id).await?;
        Ok(FlightSalesStats::compute(&itinerary.flight, &offers, &reservations))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn ensure_payable(&self, reservation: &Reservation) -> CoreResult<()> {
        if reservation.status == ReservationStatus::Confirmed {
            return Err(CoreError::AlreadyPaid(reservation.code.clone()));
        }
        reservation.status.transition(ReservationStatus::Confirmed)?;
        Ok(())
    }

    async fn confirm(&self, reservation: Reservation, receipt: PaymentReceipt) -> CoreResult<Confirmation> {
        let method = receipt.method;
        let change = StatusChange::new(&ReservationStatus::OPEN, ReservationStatus::Confirmed, receipt.processed_at)
            .with_payment(receipt);
        let confirmed = match self.apply_or_explain(&reservation, change).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    "Payment captured for reservation {} but confirmation failed: {}",
                    reservation.code, e
                );
                return Err(e);
            }
        };

        let ticket = self.issuer.issue(&confirmed).await?;
        info!(
            "Reservation {} confirmed ({} cents via {}), ticket {}",
            confirmed.code,
            confirmed.total_cents,
            method.as_str(),
            ticket.barcode
        );
        self.publish(
            &confirmed.code,
            &ReservationConfirmedEvent {
                reservation_id: confirmed.id,
                code: confirmed.code.clone(),
                flight_id: confirmed.flight_id,
                passenger_id: confirmed.passenger_id.clone(),
                total_cents: confirmed.total_cents,
                payment_method: method.as_str().to_string(),
                timestamp: self.clock.now().timestamp(),
            },
        )
        .await;
        Ok(Confirmation {
            reservation: confirmed,
            ticket,
        })
    }

    /// Run a guarded status change; when the guard fails, report what the
    /// reservation turned into in the meantime.
    async fn apply_or_explain(&self, reservation: &Reservation, change: StatusChange) -> CoreResult<Reservation> {
        let target = change.to;
        if let Some(updated) = self.reservations.apply_status(reservation.id, change).await? {
            return Ok(updated);
        }
        let current = self
            .reservations
            .get(reservation.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", reservation.id))?;
        Err(match (current.status, target) {
            (ReservationStatus::Confirmed, ReservationStatus::Confirmed) => CoreError::AlreadyPaid(current.code),
            (ReservationStatus::Confirmed, ReservationStatus::Cancelled) => {
                CoreError::CannotCancelPaidReservation(current.code)
            }
            (from, to) => CoreError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
        })
    }

    async fn publish<T: Serialize>(&self, key: &str, event: &T) {
        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize event for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.events.publish(TOPIC_RESERVATIONS, key, &payload).await {
            warn!("Failed to publish event for {}: {}", key, e);
        }
    }
}

fn authorize(caller: &PassengerIdentity, reservation: &Reservation) -> CoreResult<()> {
    if caller.can_access(&reservation.passenger_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "reservation {} belongs to another passenger",
            reservation.code
        )))
    }
}

fn normalize_seat_ids(mut ids: Vec<Uuid>) -> CoreResult<Vec<Uuid>> {
    if ids.is_empty() {
        return Err(CoreError::Validation("at least one seat must be selected".to_string()));
    }
    let requested = ids.len();
    ids.sort();
    ids.dedup();
    if ids.len() != requested {
        return Err(CoreError::Validation("the same seat was selected twice".to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_ids_are_sorted_and_checked() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = normalize_seat_ids(vec![b, a]).unwrap();
        assert!(ids[0] < ids[1]);

        assert!(normalize_seat_ids(vec![]).is_err());
        assert!(normalize_seat_ids(vec![a, a]).is_err());
    }
}
