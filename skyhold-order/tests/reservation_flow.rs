mod common;

use chrono::{Duration, TimeZone, Utc};
use skyhold_catalog::{CatalogRepository, ConfigureSeatRequest, FlightItinerary, SeatClass};
use common::{card_payment, passenger, Harness};
use skyhold_core::payment::{CardDetails, PaymentMethod, PaymentRequest, DECLINED_TEST_CARD};
use skyhold_core::{CoreError, ErrorKind};
use skyhold_order::{CreateReservation, ReservationStatus, TicketRepository};
use skyhold_shared::pii::Masked;

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_reserve_and_pay_issues_ticket() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);

    let reservation = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    assert_eq!(reservation.status, ReservationStatus::Created);
    assert_eq!(reservation.total_cents, 15000);
    assert_eq!(reservation.payment_deadline, flight.departure_at - Duration::hours(72));
    assert_eq!(reservation.payment_deadline - h.now(), Duration::hours(28));
    assert_eq!(reservation.code.len(), 8);

    let confirmation = h.engine.pay(&p, reservation.id, card_payment()).await.unwrap();
    assert_eq!(confirmation.reservation.status, ReservationStatus::Confirmed);
    assert!(confirmation.reservation.paid_at.is_some());
    let receipt = confirmation.reservation.payment.clone().unwrap();
    assert_eq!(receipt.masked_card.as_deref(), Some("**** 4242"));

    let ticket = confirmation.ticket;
    assert_eq!(ticket.barcode.len(), 12);
    assert!(ticket.seat_snapshot.to_string().contains("12A"));
    assert_eq!(ticket.flight_snapshot["code"], "AR1302");

    // the seat is now permanently taken
    let available = h.inventory.available_seats(flight.id, None).await.unwrap();
    assert!(available.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_one_seat() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;

    let flight_id = flight.id;
    let mut handles = Vec::new();
    for n in 0..16u32 {
        let engine = h.engine.clone();
        let seat = offers[0].id;
        handles.push(tokio::spawn(async move {
            engine
                .create(
                    &passenger(n),
                    CreateReservation {
                        flight_id,
                        seat_offer_ids: vec![seat],
                    },
                )
                .await
        }));
    }

    let mut won = 0;
    let mut unavailable = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(CoreError::SeatUnavailable { seat_number, .. }) => {
                assert_eq!(seat_number, "12A");
                unavailable += 1;
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(unavailable, 15);
}

#[tokio::test]
async fn test_multi_seat_request_is_all_or_nothing() {
    let h = Harness::new(start());
    let (flight, offers) = h
        .open_flight("AR1302", Duration::hours(100), &[("12A", 15000), ("12B", 15000), ("12C", 9000)])
        .await;

    h.engine
        .create(
            &passenger(1),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[1].id],
            },
        )
        .await
        .unwrap();

    let err = h
        .engine
        .create(
            &passenger(2),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id, offers[1].id],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SeatUnavailable { .. }));

    // 12A was not left behind by the failed request
    let available: Vec<String> = h
        .inventory
        .available_seats(flight.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.seat_number)
        .collect();
    assert_eq!(available, vec!["12A".to_string(), "12C".to_string()]);
}

#[tokio::test]
async fn test_one_open_reservation_per_flight() {
    let h = Harness::new(start());
    let (flight, offers) = h
        .open_flight("AR1302", Duration::hours(100), &[("12A", 15000), ("12B", 15000)])
        .await;
    let p = passenger(1);

    let first = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    let err = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[1].id],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateReservation(_)));

    // cancelling frees the passenger to book again
    h.engine.cancel(&p, first.id, None).await.unwrap();
    h.engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[1].id],
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_or_duplicate_seat_list_is_rejected() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;

    let err = h
        .engine
        .create(
            &passenger(1),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .engine
        .create(
            &passenger(1),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id, offers[0].id],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_booking_closes_at_payment_deadline() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(72), &[("12A", 15000)]).await;

    let err = h
        .engine
        .create(
            &passenger(1),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::FlightNotBookable(_)));
}

#[tokio::test]
async fn test_hold_unpaid_then_pay_later() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);

    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    let held = h.engine.hold_unpaid(&p, r.id).await.unwrap();
    assert_eq!(held.status, ReservationStatus::HeldUnpaid);
    assert_eq!(held.payment_deadline, r.payment_deadline);

    // holding twice is not a valid transition
    let err = h.engine.hold_unpaid(&p, r.id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    h.clock.advance(Duration::hours(27));
    let paid = h.engine.pay(&p, r.id, card_payment()).await.unwrap();
    assert_eq!(paid.reservation.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn test_payment_after_deadline_is_rejected() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    h.clock.set(r.payment_deadline + Duration::seconds(1));
    let err = h.engine.pay(&p, r.id, card_payment()).await.unwrap_err();
    assert!(matches!(err, CoreError::ReservationExpired { .. }));
    assert_eq!(err.kind(), ErrorKind::Expiry);

    // an administrator can still validate an offline payment
    let confirmation = h.engine.validate_payment(&h.admin, r.id).await.unwrap();
    assert_eq!(confirmation.reservation.status, ReservationStatus::Confirmed);
    assert_eq!(
        confirmation.reservation.payment.unwrap().method,
        PaymentMethod::Manual
    );
}

#[tokio::test]
async fn test_declined_card_leaves_reservation_open() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    let declined = PaymentRequest {
        method: PaymentMethod::CreditCard,
        card: Some(CardDetails {
            number: Masked(DECLINED_TEST_CARD.to_string()),
            holder: "PASSENGER ONE".to_string(),
            expiry_month: 12,
            expiry_year: 2099,
            cvv: Masked("123".to_string()),
        }),
    };
    let err = h.engine.pay(&p, r.id, declined).await.unwrap_err();
    assert!(matches!(err, CoreError::PaymentDeclined(_)));

    let current = h.engine.get(&p, r.id).await.unwrap();
    assert_eq!(current.status, ReservationStatus::Created);
    assert!(h.issuer.find_by_reservation(r.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_paid_reservation_cannot_be_paid_or_cancelled() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    h.engine.pay(&p, r.id, card_payment()).await.unwrap();

    let err = h.engine.pay(&p, r.id, card_payment()).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyPaid(_)));

    let err = h.engine.cancel(&p, r.id, Some("changed plans".to_string())).await.unwrap_err();
    assert!(matches!(err, CoreError::CannotCancelPaidReservation(_)));
}

#[tokio::test]
async fn test_ticket_issuance_is_idempotent() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    let confirmation = h.engine.pay(&p, r.id, card_payment()).await.unwrap();

    let again = h.issuer.issue(&confirmation.reservation).await.unwrap();
    assert_eq!(again.id, confirmation.ticket.id);
    assert_eq!(again.barcode, confirmation.ticket.barcode);

    let by_barcode = h
        .issuer
        .find_by_barcode(&format!("  {}  ", confirmation.ticket.barcode.to_lowercase()), 8)
        .await
        .unwrap();
    assert_eq!(by_barcode.id, confirmation.ticket.id);

    let used = h.issuer.mark_used(again.id).await.unwrap();
    assert!(used.used);
    assert_eq!(used.used_at, Some(h.now()));

    // a second scan keeps the first boarding time
    let first_scan = h.now();
    h.clock.advance(Duration::minutes(30));
    let rescanned = h.issuer.mark_used(again.id).await.unwrap();
    assert!(rescanned.used);
    assert_eq!(rescanned.used_at, Some(first_scan));
    let stored = TicketRepository::get(h.store.as_ref(), again.id).await.unwrap().unwrap();
    assert_eq!(stored.used_at, Some(first_scan));
}

#[tokio::test]
async fn test_ticket_snapshot_survives_catalog_edits() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    let confirmation = h.engine.pay(&p, r.id, card_payment()).await.unwrap();

    let mut rerouted = flight.clone();
    rerouted.destination = "MDZ".to_string();
    rerouted.departure_at = flight.departure_at + Duration::hours(3);
    h.store.save_itinerary(&FlightItinerary::direct(rerouted)).await.unwrap();
    h.configuration
        .configure_seat(
            &h.admin,
            ConfigureSeatRequest {
                flight_id: flight.id,
                physical_seat_id: offers[0].physical_seat_id,
                leg_id: None,
                seat_class: SeatClass::Business,
                price_cents: 99000,
                sellable: true,
            },
        )
        .await
        .unwrap();

    let ticket = h.issuer.get(confirmation.ticket.id).await.unwrap();
    assert_eq!(ticket.flight_snapshot, confirmation.ticket.flight_snapshot);
    assert_eq!(ticket.flight_snapshot["destination"], "COR");
    assert_eq!(ticket.seat_snapshot, confirmation.ticket.seat_snapshot);
    assert_eq!(ticket.seat_snapshot[0]["price_cents"], 15000);
}

#[tokio::test]
async fn test_selection_price_is_fixed_at_booking() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let p = passenger(1);
    let r = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    let repriced = h
        .configuration
        .configure_seat(
            &h.admin,
            ConfigureSeatRequest {
                flight_id: flight.id,
                physical_seat_id: offers[0].physical_seat_id,
                leg_id: None,
                seat_class: SeatClass::Economy,
                price_cents: 21000,
                sellable: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(repriced.id, offers[0].id);
    assert_eq!(repriced.price_cents, 21000);

    let stored = h.engine.get(&p, r.id).await.unwrap();
    assert_eq!(stored.selections[0].price_cents, 15000);
    assert_eq!(stored.total_cents, 15000);

    let confirmation = h.engine.pay(&p, r.id, card_payment()).await.unwrap();
    assert_eq!(confirmation.reservation.total_cents, 15000);
    assert_eq!(confirmation.ticket.seat_snapshot[0]["price_cents"], 15000);
}

#[tokio::test]
async fn test_lookup_by_code_is_owner_scoped() {
    let h = Harness::new(start());
    let (flight, offers) = h.open_flight("AR1302", Duration::hours(100), &[("12A", 15000)]).await;
    let owner = passenger(1);
    let r = h
        .engine
        .create(
            &owner,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    let found = h
        .engine
        .find_by_code(&owner, &format!(" {} ", r.code.to_lowercase()))
        .await
        .unwrap();
    assert_eq!(found.id, r.id);

    let err = h.engine.find_by_code(&passenger(2), &r.code).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // admins see everything
    h.engine.find_by_code(&h.admin, &r.code).await.unwrap();

    let err = h.engine.find_by_code(&owner, "AB12").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_flight_stats_and_admin_delete() {
    let h = Harness::new(start());
    let (flight, offers) = h
        .open_flight("AR1302", Duration::hours(100), &[("12A", 15000), ("12B", 15000)])
        .await;
    let p1 = passenger(1);
    let paid = h
        .engine
        .create(
            &p1,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    h.engine.pay(&p1, paid.id, card_payment()).await.unwrap();
    let pending = h
        .engine
        .create(
            &passenger(2),
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[1].id],
            },
        )
        .await
        .unwrap();

    let stats = h.engine.flight_stats(&h.admin, flight.id).await.unwrap();
    assert_eq!(stats.configured_seats, 2);
    assert_eq!(stats.paid_seats, 1);
    assert_eq!(stats.pending_seats, 1);
    assert_eq!(stats.available_seats, 0);
    assert_eq!(stats.revenue_cents, 15000);
    assert_eq!(stats.occupancy_pct, 100.0);

    assert_eq!(
        h.engine.flight_stats(&p1, flight.id).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );

    h.engine.delete(&h.admin, pending.id).await.unwrap();
    assert_eq!(h.inventory.available_seats(flight.id, None).await.unwrap().len(), 1);
    assert_eq!(
        h.engine.delete(&h.admin, pending.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_attach_seats_recomputes_total() {
    let h = Harness::new(start());
    let (flight, offers) = h
        .open_flight("AR1302", Duration::hours(100), &[("12A", 15000), ("12B", 12500), ("12C", 9900)])
        .await;
    let p = passenger(1);
    let other = passenger(2);

    let reservation = h
        .engine
        .create(
            &p,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();
    h.engine
        .create(
            &other,
            CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[2].id],
            },
        )
        .await
        .unwrap();

    let updated = h.engine.attach_seats(&p, reservation.id, vec![offers[1].id]).await.unwrap();
    assert_eq!(updated.total_cents, 27500);
    assert_eq!(updated.selections.len(), 2);

    // a seat held elsewhere aborts the whole attach
    let err = h
        .engine
        .attach_seats(&p, reservation.id, vec![offers[2].id])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SeatUnavailable { ref seat_number, .. } if seat_number == "12C"));
    let stored = h.engine.get(&p, reservation.id).await.unwrap();
    assert_eq!(stored.total_cents, 27500);

    // only an unconfirmed reservation takes more seats
    h.engine.hold_unpaid(&p, reservation.id).await.unwrap();
    let err = h
        .engine
        .attach_seats(&p, reservation.id, vec![offers[2].id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
