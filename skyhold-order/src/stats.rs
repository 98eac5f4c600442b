use serde::{Deserialize, Serialize};
use skyhold_catalog::{Flight, SeatOffer};
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::models::Reservation;

/// Sales figures for one flight, as shown on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightSalesStats {
    pub flight_id: Uuid,
    pub flight_code: String,
    /// Active offers.
    pub configured_seats: i64,
    /// Seats inside any Created, HeldUnpaid or Confirmed reservation.
    pub reserved_seats: i64,
    /// Sellable seats nobody holds.
    pub available_seats: i64,
    pub paid_seats: i64,
    pub pending_seats: i64,
    pub occupancy_pct: f64,
    /// Share of reserved seats that are paid.
    pub paid_pct: f64,
    pub revenue_cents: i64,
    pub reservations: ReservationCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationCounts {
    pub created: i64,
    pub held_unpaid: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub expired: i64,
}

impl FlightSalesStats {
    pub fn compute(flight: &Flight, offers: &[SeatOffer], reservations: &[Reservation]) -> Self {
        let configured_seats = offers.iter().filter(|o| o.active).count() as i64;

        let mut counts = ReservationCounts::default();
        let mut paid_seats = 0i64;
        let mut pending_seats = 0i64;
        let mut revenue_cents = 0i64;
        let mut held = std::collections::HashSet::new();

        for r in reservations {
            match r.status {
                ReservationStatus::Created => counts.created += 1,
                ReservationStatus::HeldUnpaid => counts.held_unpaid += 1,
                ReservationStatus::Confirmed => counts.confirmed += 1,
                ReservationStatus::Cancelled => counts.cancelled += 1,
                ReservationStatus::Expired => counts.expired += 1,
            }
            if !r.holds_seats() {
                continue;
            }
            let seats = r.selections.len() as i64;
            if r.status == ReservationStatus::Confirmed {
                paid_seats += seats;
                revenue_cents += r.total_cents;
            } else {
                pending_seats += seats;
            }
            held.extend(r.selections.iter().map(|s| s.seat_offer_id));
        }

        let reserved_seats = paid_seats + pending_seats;
        let available_seats = offers
            .iter()
            .filter(|o| o.is_bookable() && !held.contains(&o.id))
            .count() as i64;

        Self {
            flight_id: flight.id,
            flight_code: flight.code.clone(),
            configured_seats,
            reserved_seats,
            available_seats,
            paid_seats,
            pending_seats,
            occupancy_pct: percentage(reserved_seats, configured_seats),
            paid_pct: percentage(paid_seats, reserved_seats),
            revenue_cents,
            reservations: counts,
        }
    }
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::{Duration, Utc};
    use skyhold_catalog::SeatClass;

    fn offer(flight_id: Uuid, seat: &str, price: i64) -> SeatOffer {
        let now = Utc::now();
        SeatOffer {
            id: Uuid::new_v4(),
            flight_id,
            leg_id: None,
            physical_seat_id: Uuid::new_v4(),
            seat_number: seat.to_string(),
            seat_class: SeatClass::Economy,
            price_cents: price,
            sellable: true,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_flight_stats() {
        let dep = Utc::now() + Duration::days(10);
        let flight = Flight::new("AR1302", "EZE", "COR", dep, dep + Duration::hours(2), Some(Uuid::new_v4()));
        let offers: Vec<SeatOffer> = (1..=4).map(|i| offer(flight.id, &format!("{}A", i), 10000)).collect();

        let mut paid = fixtures::reservation(&[10000]);
        paid.selections[0].seat_offer_id = offers[0].id;
        paid.status = ReservationStatus::Confirmed;

        let mut pending = fixtures::reservation(&[10000]);
        pending.selections[0].seat_offer_id = offers[1].id;
        pending.status = ReservationStatus::HeldUnpaid;

        let mut cancelled = fixtures::reservation(&[10000]);
        cancelled.selections[0].seat_offer_id = offers[2].id;
        cancelled.status = ReservationStatus::Cancelled;
        cancelled.active = false;

        let stats = FlightSalesStats::compute(&flight, &offers, &[paid, pending, cancelled]);
        assert_eq!(stats.configured_seats, 4);
        assert_eq!(stats.reserved_seats, 2);
        assert_eq!(stats.available_seats, 2);
        assert_eq!(stats.paid_seats, 1);
        assert_eq!(stats.pending_seats, 1);
        assert_eq!(stats.occupancy_pct, 50.0);
        assert_eq!(stats.paid_pct, 50.0);
        assert_eq!(stats.revenue_cents, 10000);
        assert_eq!(stats.reservations.cancelled, 1);
    }

    #[test]
    fn test_empty_flight_has_zero_percentages() {
        let dep = Utc::now() + Duration::days(10);
        let flight = Flight::new("AR1", "EZE", "COR", dep, dep + Duration::hours(2), None);
        let stats = FlightSalesStats::compute(&flight, &[], &[]);
        assert_eq!(stats.occupancy_pct, 0.0);
        assert_eq!(stats.paid_pct, 0.0);
    }
}
