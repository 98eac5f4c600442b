#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use skyhold_catalog::{
    Aircraft, CatalogRepository, ConfigureSeatRequest, Flight, FlightItinerary, InventoryCatalog, SeatClass,
    SeatConfigurationManager, SeatOffer,
};
use skyhold_core::events::LoggingEventPublisher;
use skyhold_core::notification::{NotificationSender, ReservationNotice};
use skyhold_core::payment::{CardDetails, PaymentMethod, PaymentRequest, SimulatedPaymentAdapter};
use skyhold_core::{Clock, CoreError, CoreResult, ManualClock, PassengerIdentity};
use skyhold_order::{
    ExpirationScheduler, ExpiryRules, InMemoryStore, ReservationEngine, ReservationRules, TicketIssuer,
};
use skyhold_shared::pii::Masked;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ReservationNotice>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<ReservationNotice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, notice: &ReservationNotice) -> CoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::InternalError("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub inventory: Arc<InventoryCatalog>,
    pub configuration: SeatConfigurationManager,
    pub issuer: Arc<TicketIssuer>,
    pub engine: Arc<ReservationEngine>,
    pub scheduler: ExpirationScheduler,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: PassengerIdentity,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_rules(now, ExpiryRules::default())
    }

    pub fn with_rules(now: DateTime<Utc>, expiry_rules: ExpiryRules) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(now));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let notifier = Arc::new(RecordingNotifier::default());

        let inventory = Arc::new(InventoryCatalog::new(store.clone(), clock_dyn.clone()));
        let configuration = SeatConfigurationManager::new(store.clone(), clock_dyn.clone());
        let issuer = Arc::new(TicketIssuer::new(store.clone(), store.clone(), clock_dyn.clone()));
        let engine = Arc::new(ReservationEngine::new(
            inventory.clone(),
            store.clone(),
            store.clone(),
            issuer.clone(),
            Arc::new(SimulatedPaymentAdapter),
            Arc::new(LoggingEventPublisher),
            clock_dyn.clone(),
            ReservationRules::default(),
        ));
        let scheduler = ExpirationScheduler::new(
            store.clone(),
            notifier.clone(),
            Arc::new(LoggingEventPublisher),
            clock_dyn,
            expiry_rules,
        );

        Self {
            store,
            clock,
            inventory,
            configuration,
            issuer,
            engine,
            scheduler,
            notifier,
            admin: PassengerIdentity::admin("admin-1", "Ops Desk", "ops@skyhold.test"),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Direct flight on a fresh 20x6 aircraft, with the given seats on sale
    /// as economy and the flight opened for booking.
    pub async fn open_flight(&self, code: &str, departs_in: Duration, seats: &[(&str, i64)]) -> (Flight, Vec<SeatOffer>) {
        let aircraft = Aircraft::new(format!("LV-{}", code), "A320", 20, 6).unwrap();
        let physical = aircraft.generate_seats();
        self.store.save_aircraft(&aircraft, &physical).await.unwrap();

        let departure = self.now() + departs_in;
        let flight = Flight::new(code, "EZE", "COR", departure, departure + Duration::hours(2), Some(aircraft.id));
        self.store
            .save_itinerary(&FlightItinerary::direct(flight.clone()))
            .await
            .unwrap();

        let mut offers = Vec::new();
        for (number, price) in seats {
            let seat = physical.iter().find(|s| s.number() == *number).unwrap();
            let offer = self
                .configuration
                .configure_seat(
                    &self.admin,
                    ConfigureSeatRequest {
                        flight_id: flight.id,
                        physical_seat_id: seat.id,
                        leg_id: None,
                        seat_class: SeatClass::Economy,
                        price_cents: *price,
                        sellable: true,
                    },
                )
                .await
                .unwrap();
            offers.push(offer);
        }
        self.configuration.mark_configured(&self.admin, flight.id).await.unwrap();
        (flight, offers)
    }
}

pub fn passenger(n: u32) -> PassengerIdentity {
    PassengerIdentity::passenger(format!("p-{}", n), format!("Passenger {}", n), format!("p{}@example.com", n))
}

pub fn card_payment() -> PaymentRequest {
    PaymentRequest {
        method: PaymentMethod::CreditCard,
        card: Some(CardDetails {
            number: Masked("4242 4242 4242 4242".to_string()),
            holder: "PASSENGER ONE".to_string(),
            expiry_month: 12,
            expiry_year: 2099,
            cvv: Masked("123".to_string()),
        }),
    }
}
