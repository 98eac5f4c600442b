use skyhold_catalog::{CatalogRepository, InventoryCatalog, SeatConfigurationManager};
use skyhold_core::events::{EventPublisher, LoggingEventPublisher};
use skyhold_core::notification::{LoggingNotificationSender, NotificationSender};
use skyhold_core::payment::{PaymentAdapter, SimulatedPaymentAdapter};
use skyhold_core::{Clock, IdentityProvider};
use skyhold_order::{
    DocumentRenderer, ExpirationScheduler, InMemoryStore, JsonDocumentRenderer, ReservationEngine,
    ReservationRepository, TicketIssuer, TicketRepository,
};
use skyhold_store::app_config::BusinessRules;
use skyhold_store::RedisClient;
use std::sync::Arc;

use crate::middleware::auth::JwtIdentityProvider;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Storage and outbound adapters the services are wired onto.
#[derive(Clone)]
pub struct Backends {
    pub catalog: Arc<dyn CatalogRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub payments: Arc<dyn PaymentAdapter>,
    pub events: Arc<dyn EventPublisher>,
    pub notifier: Arc<dyn NotificationSender>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    /// Process-local store with log-only events and notifications.
    pub fn in_memory(store: Arc<InMemoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: store.clone(),
            reservations: store.clone(),
            tickets: store,
            payments: Arc::new(SimulatedPaymentAdapter),
            events: Arc::new(LoggingEventPublisher),
            notifier: Arc::new(LoggingNotificationSender),
            clock,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub inventory: Arc<InventoryCatalog>,
    pub configuration: Arc<SeatConfigurationManager>,
    pub issuer: Arc<TicketIssuer>,
    pub scheduler: Arc<ExpirationScheduler>,
    pub documents: Arc<dyn DocumentRenderer>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(backends: Backends, auth: AuthConfig, business_rules: BusinessRules) -> Self {
        let Backends {
            catalog,
            reservations,
            tickets,
            payments,
            events,
            notifier,
            clock,
        } = backends;

        let inventory = Arc::new(InventoryCatalog::new(catalog.clone(), clock.clone()));
        let configuration = Arc::new(SeatConfigurationManager::new(catalog.clone(), clock.clone()));
        let issuer = Arc::new(TicketIssuer::new(tickets, catalog.clone(), clock.clone()));
        let engine = Arc::new(ReservationEngine::new(
            inventory.clone(),
            catalog,
            reservations.clone(),
            issuer.clone(),
            payments,
            events.clone(),
            clock.clone(),
            business_rules.reservation_rules(),
        ));
        let scheduler = Arc::new(ExpirationScheduler::new(
            reservations,
            notifier,
            events,
            clock.clone(),
            business_rules.expiry_rules(),
        ));

        Self {
            engine,
            inventory,
            configuration,
            issuer,
            scheduler,
            documents: Arc::new(JsonDocumentRenderer),
            identity: Arc::new(JwtIdentityProvider::new(&auth.secret)),
            clock,
            redis: None,
            rate_limit_per_minute: 100,
            auth,
            business_rules,
        }
    }

    /// Enables per-IP rate limiting.
    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.redis = Some(redis);
        self.rate_limit_per_minute = per_minute;
        self
    }
}
