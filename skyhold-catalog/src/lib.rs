pub mod aircraft;
pub mod config;
pub mod configuration;
pub mod flight;
pub mod inventory;
pub mod repository;
pub mod seat_offer;

pub use aircraft::{Aircraft, AircraftStatus, PhysicalSeat};
pub use config::FlightBookingConfig;
pub use configuration::{ConfigureSeatRequest, SeatConfigurationManager};
pub use flight::{Flight, FlightItinerary, FlightLeg};
pub use inventory::InventoryCatalog;
pub use repository::CatalogRepository;
pub use seat_offer::{SeatClass, SeatMapEntry, SeatOffer};
