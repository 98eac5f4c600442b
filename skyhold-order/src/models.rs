use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use skyhold_catalog::SeatClass;
use skyhold_core::payment::PaymentReceipt;
use skyhold_shared::pii::Masked;
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;

/// A passenger's claim on one or more seats of a flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    /// 8-character base-36 code shown to the passenger.
    pub code: String,
    pub flight_id: Uuid,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_email: Masked<String>,
    pub status: ReservationStatus,
    pub selections: Vec<SeatSelection>,
    /// Always equal to the sum of the selections' price snapshots.
    pub total_cents: i64,
    /// Fixed at creation: departure minus the payment window.
    pub payment_deadline: DateTime<Utc>,
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub payment: Option<PaymentReceipt>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn computed_total(&self) -> i64 {
        self.selections.iter().map(|s| s.price_cents).sum()
    }

    pub fn recompute_total(&mut self) {
        self.total_cents = self.computed_total();
    }

    pub fn add_selection(&mut self, selection: SeatSelection) {
        self.selections.push(selection);
        self.recompute_total();
    }

    pub fn remove_selection(&mut self, seat_offer_id: Uuid) -> Option<SeatSelection> {
        let idx = self.selections.iter().position(|s| s.seat_offer_id == seat_offer_id)?;
        let removed = self.selections.remove(idx);
        self.recompute_total();
        Some(removed)
    }

    pub fn seat_numbers(&self) -> Vec<String> {
        self.selections.iter().map(|s| s.seat_number.clone()).collect()
    }

    pub fn holds_seats(&self) -> bool {
        self.active && self.status.is_blocking()
    }

    pub fn is_payable_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.payment_deadline
    }

    /// Whole hours left to pay; negative once the deadline has passed.
    pub fn hours_to_deadline(&self, now: DateTime<Utc>) -> i64 {
        (self.payment_deadline - now).num_hours()
    }

    pub fn deadline_for(departure_at: DateTime<Utc>, payment_window: Duration) -> DateTime<Utc> {
        departure_at - payment_window
    }
}

/// One seat inside a reservation, with the price it was sold at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatSelection {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub seat_offer_id: Uuid,
    pub leg_id: Option<Uuid>,
    pub seat_number: String,
    pub seat_class: SeatClass,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Issued once per confirmed reservation. Snapshots are frozen at issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub barcode: String,
    pub flight_snapshot: serde_json::Value,
    pub seat_snapshot: serde_json::Value,
    pub passenger_snapshot: serde_json::Value,
    pub issued_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// One-way. The first scan time is kept.
    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        if !self.used {
            self.used = true;
            self.used_at = Some(at);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_total_tracks_selections() {
        let mut reservation = fixtures::reservation(&[15000, 22050]);
        assert_eq!(reservation.total_cents, 37050);

        let first = reservation.selections[0].seat_offer_id;
        reservation.remove_selection(first).unwrap();
        assert_eq!(reservation.total_cents, 22050);
        assert!(reservation.remove_selection(first).is_none());
    }

    #[test]
    fn test_deadline_helpers() {
        let departure = Utc::now() + Duration::hours(100);
        let deadline = Reservation::deadline_for(departure, Duration::hours(72));
        assert_eq!(departure - deadline, Duration::hours(72));

        let reservation = fixtures::reservation(&[100]);
        let now = reservation.payment_deadline - Duration::minutes(90);
        assert!(reservation.is_payable_at(now));
        assert_eq!(reservation.hours_to_deadline(now), 1);
        assert!(!reservation.is_payable_at(reservation.payment_deadline + Duration::seconds(1)));
    }

    #[test]
    fn test_ticket_use_is_one_way() {
        let mut ticket = Ticket {
            id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            barcode: "ABCDEF123456".to_string(),
            flight_snapshot: serde_json::json!({}),
            seat_snapshot: serde_json::json!([]),
            passenger_snapshot: serde_json::json!({}),
            issued_at: Utc::now(),
            used: false,
            used_at: None,
        };
        let first = Utc::now();
        ticket.mark_used(first);
        ticket.mark_used(first + Duration::hours(1));
        assert!(ticket.used);
        assert_eq!(ticket.used_at, Some(first));
    }

    proptest! {
        #[test]
        fn prop_total_equals_sum_after_mutations(
            prices in prop::collection::vec(1i64..500_000, 0..20),
            removals in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        ) {
            let mut reservation = fixtures::reservation(&prices);
            prop_assert_eq!(reservation.total_cents, prices.iter().sum::<i64>());

            for idx in removals {
                if reservation.selections.is_empty() {
                    break;
                }
                let offer = reservation.selections[idx.index(reservation.selections.len())].seat_offer_id;
                reservation.remove_selection(offer);
                prop_assert_eq!(reservation.total_cents, reservation.computed_total());
            }
        }
    }
}
