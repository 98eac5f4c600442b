use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_core::payment::PaymentReceipt;
use skyhold_core::CoreResult;
use skyhold_shared::pii::Masked;
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::models::{Reservation, Ticket};

/// Everything needed to create a reservation in one atomic unit.
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub id: Uuid,
    pub code: String,
    pub flight_id: Uuid,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_email: Masked<String>,
    /// Sorted ascending and de-duplicated; locks are taken in this order.
    pub seat_offer_ids: Vec<Uuid>,
    pub payment_deadline: DateTime<Utc>,
    /// Reject when the passenger already holds an open or confirmed
    /// reservation on the same flight.
    pub single_active_per_flight: bool,
    pub created_at: DateTime<Utc>,
}

/// A guarded status change. Applied only if the stored status is one of
/// the `expected` ones at write time.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: Vec<ReservationStatus>,
    pub to: ReservationStatus,
    pub active: bool,
    pub payment: Option<PaymentReceipt>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(expected: &[ReservationStatus], to: ReservationStatus, at: DateTime<Utc>) -> Self {
        Self {
            expected: expected.to_vec(),
            to,
            active: !matches!(to, ReservationStatus::Cancelled | ReservationStatus::Expired),
            payment: None,
            at,
        }
    }

    pub fn with_payment(mut self, receipt: PaymentReceipt) -> Self {
        self.payment = Some(receipt);
        self
    }
}

/// An open reservation as seen by the expiration sweep.
#[derive(Debug, Clone)]
pub struct SweepCandidate {
    pub reservation: Reservation,
    pub flight_code: String,
    pub departure_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Lock the requested offers (ascending id), re-check that none is held
    /// by a blocking reservation, then insert the reservation, its
    /// selections with price snapshots and the aggregate total. All or
    /// nothing.
    ///
    /// Fails with `SeatUnavailable` for the first taken seat,
    /// `DuplicateReservation` when `single_active_per_flight` is violated and
    /// `DuplicateCode` when the code collides.
    async fn create_reservation(&self, draft: ReservationDraft) -> CoreResult<Reservation>;

    /// Same discipline as `create_reservation`, for a reservation that is
    /// still Created. Returns the reservation with its recomputed total.
    async fn attach_seats(&self, reservation_id: Uuid, seat_offer_ids: &[Uuid], at: DateTime<Utc>) -> CoreResult<Reservation>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>>;

    async fn find_by_code(&self, code: &str) -> CoreResult<Option<Reservation>>;

    /// Newest first.
    async fn list_for_passenger(&self, passenger_id: &str) -> CoreResult<Vec<Reservation>>;

    async fn list_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Reservation>>;

    /// Compare-and-set. `None` when the stored status was not expected.
    async fn apply_status(&self, id: Uuid, change: StatusChange) -> CoreResult<Option<Reservation>>;

    /// Delete the reservation and its selections. When `expected` is given the
    /// row is only removed if its status is one of them. Returns whether a row
    /// was deleted.
    async fn delete(&self, id: Uuid, expected: Option<&[ReservationStatus]>) -> CoreResult<bool>;

    /// Atomically flip `reminder_sent` from false to true.
    async fn claim_reminder(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<bool>;

    /// Undo a claim after a failed send so the next sweep retries.
    async fn release_reminder(&self, id: Uuid) -> CoreResult<()>;

    /// Active, open reservations whose flight departs after `departing_after`,
    /// earliest departure first.
    async fn sweep_candidates(
        &self,
        departing_after: DateTime<Utc>,
        limit: usize,
        code: Option<&str>,
    ) -> CoreResult<Vec<SweepCandidate>>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert unless the reservation already has a ticket, in which case the
    /// existing one is returned. `DuplicateCode` on barcode collision.
    async fn insert_if_absent(&self, ticket: &Ticket) -> CoreResult<Ticket>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Ticket>>;

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<Ticket>>;

    async fn find_by_barcode(&self, barcode: &str) -> CoreResult<Option<Ticket>>;

    /// Set `used` once; later calls return the ticket unchanged.
    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Ticket>>;
}
