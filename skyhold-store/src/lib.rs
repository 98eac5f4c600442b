pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod redis_repo;
pub mod reservation_repo;
pub mod ticket_repo;

pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use events::{EventProducer, KafkaNotificationSender};
pub use redis_repo::RedisClient;
pub use reservation_repo::PgReservationRepository;
pub use ticket_repo::PgTicketRepository;
