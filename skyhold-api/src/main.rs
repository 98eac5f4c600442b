use skyhold_api::{app, demo, worker, AppState, AuthConfig, Backends};
use skyhold_core::events::{EventPublisher, LoggingEventPublisher};
use skyhold_core::notification::{LoggingNotificationSender, NotificationSender};
use skyhold_core::payment::SimulatedPaymentAdapter;
use skyhold_core::{Clock, SystemClock};
use skyhold_order::InMemoryStore;
use skyhold_store::{
    DbClient, EventProducer, KafkaNotificationSender, PgCatalogRepository, PgReservationRepository,
    PgTicketRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyhold_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skyhold_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting SkyHold API on port {}", config.server.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Kafka Connection
    let (events, notifier): (Arc<dyn EventPublisher>, Arc<dyn NotificationSender>) = match &config.kafka {
        Some(kafka) => {
            let producer = EventProducer::new(&kafka.brokers).expect("Failed to create Kafka producer");
            (Arc::new(producer.clone()), Arc::new(KafkaNotificationSender::new(producer)))
        }
        None => {
            tracing::warn!("Kafka not configured; events and notifications are only logged");
            (Arc::new(LoggingEventPublisher), Arc::new(LoggingNotificationSender))
        }
    };

    // Storage
    let mut seed_store = None;
    let backends = match &config.database {
        Some(db) => {
            let client = DbClient::new(&db.url, db.max_connections)
                .await
                .expect("Failed to connect to Postgres");
            client.migrate().await.expect("Failed to run migrations");
            Backends {
                catalog: Arc::new(PgCatalogRepository::new(client.pool.clone())),
                reservations: Arc::new(PgReservationRepository::new(client.pool.clone())),
                tickets: Arc::new(PgTicketRepository::new(client.pool.clone())),
                payments: Arc::new(SimulatedPaymentAdapter),
                events,
                notifier,
                clock,
            }
        }
        None => {
            tracing::warn!("No database configured; state is kept in memory");
            let store = Arc::new(InMemoryStore::new());
            seed_store = Some(store.clone());
            Backends {
                events,
                notifier,
                ..Backends::in_memory(store, clock)
            }
        }
    };

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };
    let mut app_state = AppState::new(backends, auth, config.business_rules.clone());

    // Redis Connection
    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(&redis.url)
            .await
            .expect("Failed to connect to Redis");
        app_state = app_state.with_rate_limit(Arc::new(redis_client), redis.rate_limit_per_minute);
    }

    if let (true, Some(store)) = (config.server.seed_demo_data, seed_store) {
        let flights = demo::seed_demo_data(store.as_ref(), &app_state)
            .await
            .expect("Failed to seed demo data");
        tracing::info!("Seeded {} demo flights", flights.len());
    }

    tokio::spawn(worker::start_expiration_worker(
        app_state.scheduler.clone(),
        config.business_rules.sweep_interval_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .unwrap();
}
