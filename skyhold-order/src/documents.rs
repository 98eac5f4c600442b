use serde_json::json;
use skyhold_catalog::FlightItinerary;
use skyhold_core::{CoreError, CoreResult};

use crate::lifecycle::ReservationStatus;
use crate::models::{Reservation, Ticket};

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub content_type: &'static str,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Produces printable documents from stored data. Ticket documents only
/// read the issuance snapshots, never live catalog rows.
pub trait DocumentRenderer: Send + Sync {
    fn render_ticket(&self, ticket: &Ticket) -> CoreResult<RenderedDocument>;

    /// Payment instructions for a reservation that is not paid yet.
    fn render_reservation(&self, reservation: &Reservation, itinerary: &FlightItinerary) -> CoreResult<RenderedDocument>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDocumentRenderer;

impl JsonDocumentRenderer {
    fn to_document(filename: String, body: serde_json::Value) -> CoreResult<RenderedDocument> {
        let bytes = serde_json::to_vec_pretty(&body).map_err(|e| CoreError::InternalError(e.to_string()))?;
        Ok(RenderedDocument {
            content_type: "application/json",
            filename,
            bytes,
        })
    }
}

impl DocumentRenderer for JsonDocumentRenderer {
    fn render_ticket(&self, ticket: &Ticket) -> CoreResult<RenderedDocument> {
        Self::to_document(
            format!("ticket-{}.json", ticket.barcode),
            json!({
                "document": "BOARDING_TICKET",
                "barcode": ticket.barcode,
                "issued_at": ticket.issued_at,
                "used": ticket.used,
                "used_at": ticket.used_at,
                "passenger": ticket.passenger_snapshot,
                "flight": ticket.flight_snapshot,
                "seats": ticket.seat_snapshot,
            }),
        )
    }

    fn render_reservation(&self, reservation: &Reservation, itinerary: &FlightItinerary) -> CoreResult<RenderedDocument> {
        if reservation.status == ReservationStatus::Confirmed {
            return Err(CoreError::Validation(format!(
                "reservation {} is paid; download the ticket instead",
                reservation.code
            )));
        }
        let flight = &itinerary.flight;
        let seats: Vec<_> = reservation
            .selections
            .iter()
            .map(|s| {
                json!({
                    "seat_number": s.seat_number,
                    "seat_class": s.seat_class,
                    "price_cents": s.price_cents,
                })
            })
            .collect();

        Self::to_document(
            format!("reservation-{}.json", reservation.code),
            json!({
                "document": "RESERVATION_DETAIL",
                "code": reservation.code,
                "status": reservation.status,
                "passenger": {
                    "full_name": reservation.passenger_name,
                    "email": reservation.passenger_email,
                },
                "flight": {
                    "code": flight.code,
                    "origin": flight.origin,
                    "destination": flight.destination,
                    "departure_at": flight.departure_at,
                    "arrival_at": flight.arrival_at,
                    "has_legs": itinerary.has_legs(),
                },
                "seats": seats,
                "total_cents": reservation.total_cents,
                "payment_deadline": reservation.payment_deadline,
                "instructions": format!(
                    "Pay before {} or the reservation is cancelled and the seats released.",
                    reservation.payment_deadline.format("%d/%m/%Y %H:%M UTC")
                ),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::{Duration, Utc};
    use skyhold_catalog::Flight;

    #[test]
    fn test_reservation_document_carries_deadline_and_total() {
        let reservation = fixtures::reservation(&[15000]);
        let dep = Utc::now() + Duration::hours(100);
        let itinerary = FlightItinerary::direct(Flight::new("AR1302", "EZE", "COR", dep, dep + Duration::hours(2), None));

        let doc = JsonDocumentRenderer.render_reservation(&reservation, &itinerary).unwrap();
        assert_eq!(doc.filename, "reservation-AB12CD34.json");
        let body: serde_json::Value = serde_json::from_slice(&doc.bytes).unwrap();
        assert_eq!(body["total_cents"], 15000);
        assert_eq!(body["seats"][0]["seat_number"], "1A");
        assert_eq!(body["status"], "CREATED");
    }

    #[test]
    fn test_paid_reservation_has_no_detail_document() {
        let mut reservation = fixtures::reservation(&[15000]);
        reservation.status = ReservationStatus::Confirmed;
        let dep = Utc::now() + Duration::hours(100);
        let itinerary = FlightItinerary::direct(Flight::new("AR1302", "EZE", "COR", dep, dep + Duration::hours(2), None));
        assert!(JsonDocumentRenderer.render_reservation(&reservation, &itinerary).is_err());
    }
}
