use chrono::Duration;
use skyhold_catalog::{
    Aircraft, CatalogRepository, ConfigureSeatRequest, Flight, FlightItinerary, FlightLeg, PhysicalSeat, SeatClass,
};
use skyhold_core::PassengerIdentity;
use tracing::info;
use uuid::Uuid;

use crate::middleware::auth::JwtIdentityProvider;
use crate::state::AppState;

const BUSINESS_ROWS: u16 = 3;
const BUSINESS_PRICE_CENTS: i64 = 185_000;
const ECONOMY_PRICE_CENTS: i64 = 64_500;

/// Seeds two aircraft and three bookable flights, one of them with two legs,
/// and logs bearer tokens for a demo passenger and a demo administrator.
pub async fn seed_demo_data(catalog: &dyn CatalogRepository, state: &AppState) -> anyhow::Result<Vec<Flight>> {
    let admin = PassengerIdentity::admin("demo-admin", "Demo Operations", "ops@skyhold.example");
    let now = state.clock.now();

    let narrow = Aircraft::new("LV-SKA", "Airbus A320", 25, 6)?;
    let narrow_seats = narrow.generate_seats();
    catalog.save_aircraft(&narrow, &narrow_seats).await?;

    let regional = Aircraft::new("LV-SKB", "Embraer E190", 24, 4)?;
    let regional_seats = regional.generate_seats();
    catalog.save_aircraft(&regional, &regional_seats).await?;

    let mut flights = Vec::new();

    // Direct, far enough out to be payable for a few days.
    let departure = now + Duration::days(6);
    let mut cordoba = Flight::new("SK1402", "EZE", "COR", departure, departure + Duration::minutes(95), Some(narrow.id));
    cordoba.distance_km = Some(650);
    catalog.save_itinerary(&FlightItinerary::direct(cordoba.clone())).await?;
    open_for_sale(state, &admin, cordoba.id, None, &narrow_seats).await?;
    flights.push(cordoba);

    // Direct, inside the reminder band on start-up.
    let departure = now + Duration::hours(100);
    let mut mendoza = Flight::new("SK1510", "AEP", "MDZ", departure, departure + Duration::minutes(110), Some(regional.id));
    mendoza.distance_km = Some(985);
    catalog.save_itinerary(&FlightItinerary::direct(mendoza.clone())).await?;
    open_for_sale(state, &admin, mendoza.id, None, &regional_seats).await?;
    flights.push(mendoza);

    // Two legs, each flown by a different aircraft.
    let departure = now + Duration::days(9);
    let ushuaia = Flight::new("SK2300", "EZE", "USH", departure, departure + Duration::hours(7), None);
    let legs = vec![
        FlightLeg::new(ushuaia.id, 1, "EZE", "COR", departure, departure + Duration::minutes(95), narrow.id, Some(650)),
        FlightLeg::new(
            ushuaia.id,
            2,
            "COR",
            "USH",
            departure + Duration::hours(3),
            departure + Duration::hours(7),
            regional.id,
            Some(2400),
        ),
    ];
    let itinerary = FlightItinerary::with_legs(ushuaia.clone(), legs);
    catalog.save_itinerary(&itinerary).await?;
    for leg in &itinerary.legs {
        let seats = if leg.aircraft_id == narrow.id { &narrow_seats } else { &regional_seats };
        open_for_sale(state, &admin, ushuaia.id, Some(leg.id), seats).await?;
    }
    flights.push(ushuaia);

    for flight in &flights {
        state.configuration.mark_configured(&admin, flight.id).await?;
        info!("Demo flight {} {} -> {} departs {}", flight.code, flight.origin, flight.destination, flight.departure_at);
    }

    let tokens = JwtIdentityProvider::new(&state.auth.secret);
    let passenger = PassengerIdentity::passenger("demo-passenger", "Demo Passenger", "passenger@skyhold.example");
    info!("Demo passenger token: {}", tokens.issue(&passenger, state.auth.expiration)?);
    info!("Demo admin token: {}", tokens.issue(&admin, state.auth.expiration)?);

    Ok(flights)
}

async fn open_for_sale(
    state: &AppState,
    admin: &PassengerIdentity,
    flight_id: Uuid,
    leg_id: Option<Uuid>,
    seats: &[PhysicalSeat],
) -> anyhow::Result<()> {
    for seat in seats {
        let (seat_class, price_cents) = if seat.row <= BUSINESS_ROWS {
            (SeatClass::Business, BUSINESS_PRICE_CENTS)
        } else {
            (SeatClass::Economy, ECONOMY_PRICE_CENTS)
        };
        state
            .configuration
            .configure_seat(
                admin,
                ConfigureSeatRequest {
                    flight_id,
                    physical_seat_id: seat.id,
                    leg_id,
                    seat_class,
                    price_cents,
                    sellable: true,
                },
            )
            .await?;
    }
    Ok(())
}
