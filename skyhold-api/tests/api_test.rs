use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use skyhold_api::middleware::JwtIdentityProvider;
use skyhold_api::{app, AppState, AuthConfig, Backends};
use skyhold_catalog::{Aircraft, CatalogRepository, ConfigureSeatRequest, Flight, FlightItinerary, SeatClass, SeatOffer};
use skyhold_core::{Clock, ManualClock, PassengerIdentity};
use skyhold_order::InMemoryStore;
use skyhold_store::app_config::BusinessRules;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";

struct TestApp {
    router: Router,
    state: AppState,
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    tokens: JwtIdentityProvider,
    admin: PassengerIdentity,
}

impl TestApp {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(
            Backends::in_memory(store.clone(), clock_dyn),
            AuthConfig {
                secret: SECRET.to_string(),
                expiration: 600,
            },
            BusinessRules::default(),
        );

        Self {
            router: app(state.clone()),
            state,
            store,
            clock,
            tokens: JwtIdentityProvider::new(SECRET),
            admin: PassengerIdentity::admin("admin-1", "Ops Desk", "ops@skyhold.test"),
        }
    }

    fn token_for(&self, identity: &PassengerIdentity) -> String {
        self.tokens.issue(identity, 600).unwrap()
    }

    /// Direct flight departing in five days with seats 1A and 1B on sale.
    async fn open_flight(&self) -> (Flight, Vec<SeatOffer>) {
        let catalog: &dyn CatalogRepository = self.store.as_ref();
        let aircraft = Aircraft::new("LV-API", "A320", 10, 4).unwrap();
        let seats = aircraft.generate_seats();
        catalog.save_aircraft(&aircraft, &seats).await.unwrap();

        let departure = self.clock.now() + Duration::days(5);
        let flight = Flight::new("SK100", "EZE", "BRC", departure, departure + Duration::hours(2), Some(aircraft.id));
        catalog.save_itinerary(&FlightItinerary::direct(flight.clone())).await.unwrap();

        let mut offers = Vec::new();
        for number in ["1A", "1B"] {
            let seat = seats.iter().find(|s| s.number() == number).unwrap();
            let offer = self
                .state
                .configuration
                .configure_seat(
                    &self.admin,
                    ConfigureSeatRequest {
                        flight_id: flight.id,
                        physical_seat_id: seat.id,
                        leg_id: None,
                        seat_class: SeatClass::Economy,
                        price_cents: 50_000,
                        sellable: true,
                    },
                )
                .await
                .unwrap();
            offers.push(offer);
        }
        self.state.configuration.mark_configured(&self.admin, flight.id).await.unwrap();
        (flight, offers)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

fn card() -> Value {
    json!({
        "method": "CREDIT_CARD",
        "card": {
            "number": "4242424242424242",
            "holder": "MARIA LOPEZ",
            "expiry_month": 11,
            "expiry_year": 2099,
            "cvv": "321"
        }
    })
}

fn maria() -> PassengerIdentity {
    PassengerIdentity::passenger("p-maria", "Maria Lopez", "maria@example.com")
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["redis"], "disabled");
}

#[tokio::test]
async fn test_public_flight_listing_and_seat_map() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;

    let (status, body) = app.send(Method::GET, "/v1/flights", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["code"], "SK100");

    let (status, body) = app
        .send(Method::GET, &format!("/v1/flights/{}", flight.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_duration_minutes"], 120);

    let token = app.token_for(&maria());
    let (status, _) = app
        .send(
            Method::POST,
            "/v1/reservations",
            Some(&token),
            Some(json!({ "flight_id": flight.id, "seat_offer_ids": [offers[0].id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, seats) = app
        .send(Method::GET, &format!("/v1/flights/{}/seats", flight.id), None, None)
        .await;
    assert_eq!(seats.as_array().unwrap().len(), 1);
    assert_eq!(seats[0]["id"], json!(offers[1].id));

    let (_, map) = app
        .send(Method::GET, &format!("/v1/flights/{}/seat-map", flight.id), None, None)
        .await;
    let map = map.as_array().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map[0]["available"], false);
    assert_eq!(map[1]["available"], true);
}

#[tokio::test]
async fn test_reserve_pay_and_verify_ticket() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;
    let token = app.token_for(&maria());

    let (status, created) = app
        .send(
            Method::POST,
            "/v1/reservations",
            Some(&token),
            Some(json!({ "flight_id": flight.id, "seat_offer_ids": [offers[0].id, offers[1].id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], json!("CREATED"));
    assert_eq!(created["total_cents"], 100_000);
    // Departure in 120h, deadline 72h before it.
    assert_eq!(created["hours_to_deadline"], 48);

    let id = created["id"].as_str().unwrap().to_string();
    let code = created["code"].as_str().unwrap().to_lowercase();

    let (status, found) = app
        .send(Method::GET, &format!("/v1/reservations/code/{}", code), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], json!(id));

    let (status, confirmation) = app
        .send(Method::POST, &format!("/v1/reservations/{}/pay", id), Some(&token), Some(card()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmation["reservation"]["status"], json!("CONFIRMED"));
    assert_eq!(confirmation["reservation"]["payment"]["masked_card"], "**** 4242");

    let barcode = confirmation["ticket"]["barcode"].as_str().unwrap().to_string();
    let ticket_id = confirmation["ticket"]["id"].as_str().unwrap().to_string();

    let (status, verification) = app
        .send(Method::GET, &format!("/v1/tickets/barcode/{}", barcode), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verification["used"], false);
    assert!(verification.get("passenger_snapshot").is_none());

    let (status, _) = app
        .send(Method::GET, &format!("/v1/tickets/{}", ticket_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::POST, &format!("/v1/reservations/{}/cancel", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ticket_document_is_an_attachment() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;
    let passenger = maria();
    let confirmation = {
        let reservation = app
            .state
            .engine
            .create(
                &passenger,
                skyhold_order::CreateReservation {
                    flight_id: flight.id,
                    seat_offer_ids: vec![offers[0].id],
                },
            )
            .await
            .unwrap();
        app.state.engine.validate_payment(&app.admin, reservation.id).await.unwrap()
    };

    let request = Request::builder()
        .uri(format!("/v1/tickets/{}/document", confirmation.ticket.id))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(&passenger)))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&confirmation.ticket.barcode));
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let app = TestApp::new();
    let (flight, _) = app.open_flight().await;

    let (status, _) = app.send(Method::GET, "/v1/reservations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/v1/reservations", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let passenger_token = app.token_for(&maria());
    let stats_uri = format!("/v1/admin/flights/{}/stats", flight.id);
    let (status, _) = app.send(Method::GET, &stats_uri, Some(&passenger_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = app.token_for(&app.admin);
    let (status, stats) = app.send(Method::GET, &stats_uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["configured_seats"], 2);
}

#[tokio::test]
async fn test_seat_conflict_maps_to_409() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;
    let other = PassengerIdentity::passenger("p-juan", "Juan Perez", "juan@example.com");

    let body = json!({ "flight_id": flight.id, "seat_offer_ids": [offers[0].id] });
    let (status, _) = app
        .send(Method::POST, "/v1/reservations", Some(&app.token_for(&maria())), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = app
        .send(Method::POST, "/v1/reservations", Some(&app.token_for(&other)), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "SEAT_UNAVAILABLE");
}

#[tokio::test]
async fn test_late_payment_is_gone() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;
    let token = app.token_for(&maria());

    let (_, created) = app
        .send(
            Method::POST,
            "/v1/reservations",
            Some(&token),
            Some(json!({ "flight_id": flight.id, "seat_offer_ids": [offers[0].id] })),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    app.clock.advance(Duration::hours(49));

    let (status, error) = app
        .send(Method::POST, &format!("/v1/reservations/{}/pay", id), Some(&token), Some(card()))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(error["code"], "RESERVATION_EXPIRED");
}

#[tokio::test]
async fn test_admin_sweep_and_delete() {
    let app = TestApp::new();
    let (flight, offers) = app.open_flight().await;
    let admin_token = app.token_for(&app.admin);

    let reservation = app
        .state
        .engine
        .create(
            &maria(),
            skyhold_order::CreateReservation {
                flight_id: flight.id,
                seat_offer_ids: vec![offers[0].id],
            },
        )
        .await
        .unwrap();

    // Past the deadline, outside the final 24h.
    app.clock.advance(Duration::hours(49));

    let (status, report) = app
        .send(Method::POST, "/v1/admin/sweep", Some(&admin_token), Some(json!({ "dry_run": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["cancelled"], 1);

    let (_, report) = app
        .send(Method::POST, "/v1/admin/sweep", Some(&admin_token), Some(json!({})))
        .await;
    assert_eq!(report["cancelled"], 1);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/v1/admin/reservations/{}", reservation.id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/v1/reservations/{}", reservation.id),
            Some(&app.token_for(&maria())),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
