pub mod documents;
pub mod engine;
pub mod expiry;
pub mod fulfillment;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod repository;
pub mod stats;

pub use documents::{DocumentRenderer, JsonDocumentRenderer, RenderedDocument};
pub use engine::{Confirmation, CreateReservation, ReservationEngine, ReservationRules};
pub use expiry::{CloseWindowAction, ExpirationScheduler, ExpiryRules, SweepOptions, SweepReport};
pub use fulfillment::TicketIssuer;
pub use lifecycle::ReservationStatus;
pub use memory::InMemoryStore;
pub use models::{Reservation, SeatSelection, Ticket};
pub use repository::{ReservationRepository, TicketRepository};
pub use stats::FlightSalesStats;
