use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_catalog::{
    Aircraft, AircraftStatus, CatalogRepository, Flight, FlightBookingConfig, FlightItinerary, FlightLeg,
    PhysicalSeat, SeatClass, SeatOffer,
};
use skyhold_core::{CoreError, CoreResult};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::database::storage_error;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(sqlx::FromRow)]
struct AircraftRow {
    id: Uuid,
    registration: String,
    model: String,
    seat_rows: i32,
    seat_columns: i32,
    status: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AircraftRow> for Aircraft {
    type Error = CoreError;

    fn try_from(row: AircraftRow) -> CoreResult<Self> {
        Ok(Aircraft {
            id: row.id,
            registration: row.registration,
            model: row.model,
            rows: row.seat_rows as u16,
            columns: row.seat_columns as u8,
            status: AircraftStatus::parse(&row.status)
                .ok_or_else(|| CoreError::Storage(format!("unknown aircraft status {}", row.status)))?,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    aircraft_id: Uuid,
    seat_row: i32,
    seat_column: String,
    active: bool,
}

impl From<SeatRow> for PhysicalSeat {
    fn from(row: SeatRow) -> Self {
        PhysicalSeat {
            id: row.id,
            aircraft_id: row.aircraft_id,
            row: row.seat_row as u16,
            column: row.seat_column.chars().next().unwrap_or('?'),
            active: row.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    code: String,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    arrival_at: DateTime<Utc>,
    aircraft_id: Option<Uuid>,
    distance_km: Option<i32>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            code: row.code,
            origin: row.origin,
            destination: row.destination,
            departure_at: row.departure_at,
            arrival_at: row.arrival_at,
            aircraft_id: row.aircraft_id,
            distance_km: row.distance_km,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LegRow {
    id: Uuid,
    flight_id: Uuid,
    leg_order: i32,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    arrival_at: DateTime<Utc>,
    aircraft_id: Uuid,
    distance_km: Option<i32>,
    active: bool,
}

impl From<LegRow> for FlightLeg {
    fn from(row: LegRow) -> Self {
        FlightLeg {
            id: row.id,
            flight_id: row.flight_id,
            leg_order: row.leg_order,
            origin: row.origin,
            destination: row.destination,
            departure_at: row.departure_at,
            arrival_at: row.arrival_at,
            aircraft_id: row.aircraft_id,
            distance_km: row.distance_km,
            active: row.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    flight_id: Uuid,
    configured: bool,
    configured_by: Option<String>,
    configured_at: Option<DateTime<Utc>>,
    configured_seat_count: i32,
    enabled_seat_count: i32,
}

impl From<ConfigRow> for FlightBookingConfig {
    fn from(row: ConfigRow) -> Self {
        FlightBookingConfig {
            flight_id: row.flight_id,
            configured: row.configured,
            configured_by: row.configured_by,
            configured_at: row.configured_at,
            configured_seat_count: row.configured_seat_count,
            enabled_seat_count: row.enabled_seat_count,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct OfferRow {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub leg_id: Option<Uuid>,
    pub physical_seat_id: Uuid,
    pub seat_number: String,
    pub seat_class: String,
    pub price_cents: i64,
    pub sellable: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for SeatOffer {
    type Error = CoreError;

    fn try_from(row: OfferRow) -> CoreResult<Self> {
        Ok(SeatOffer {
            id: row.id,
            flight_id: row.flight_id,
            leg_id: row.leg_id,
            physical_seat_id: row.physical_seat_id,
            seat_number: row.seat_number,
            seat_class: parse_seat_class(&row.seat_class)?,
            price_cents: row.price_cents,
            sellable: row.sellable,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn parse_seat_class(value: &str) -> CoreResult<SeatClass> {
    SeatClass::parse(value).ok_or_else(|| CoreError::Storage(format!("unknown seat class {}", value)))
}

pub(crate) const OFFER_COLUMNS: &str = "id, flight_id, leg_id, physical_seat_id, seat_number, seat_class, \
     price_cents, sellable, active, created_at, updated_at";

const FLIGHT_COLUMNS: &str =
    "id, code, origin, destination, departure_at, arrival_at, aircraft_id, distance_km, active, created_at";

// ============================================================================
// Repository
// ============================================================================

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn save_aircraft(&self, aircraft: &Aircraft, seats: &[PhysicalSeat]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO aircraft (id, registration, model, seat_rows, seat_columns, status, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(aircraft.id)
        .bind(&aircraft.registration)
        .bind(&aircraft.model)
        .bind(aircraft.rows as i32)
        .bind(aircraft.columns as i32)
        .bind(aircraft.status.as_str())
        .bind(aircraft.active)
        .bind(aircraft.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match crate::database::unique_violation(&e) {
            Some(_) => CoreError::Validation(format!("registration {} already exists", aircraft.registration)),
            None => storage_error(e),
        })?;

        for seat in seats {
            sqlx::query(
                "INSERT INTO physical_seats (id, aircraft_id, seat_row, seat_column, active) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(seat.id)
            .bind(seat.aircraft_id)
            .bind(seat.row as i32)
            .bind(seat.column.to_string())
            .bind(seat.active)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)
    }

    async fn get_aircraft(&self, id: Uuid) -> CoreResult<Option<Aircraft>> {
        sqlx::query_as::<_, AircraftRow>(
            "SELECT id, registration, model, seat_rows, seat_columns, status, active, created_at FROM aircraft WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .map(Aircraft::try_from)
        .transpose()
    }

    async fn get_physical_seat(&self, id: Uuid) -> CoreResult<Option<PhysicalSeat>> {
        let row = sqlx::query_as::<_, SeatRow>(
            "SELECT id, aircraft_id, seat_row, seat_column, active FROM physical_seats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(PhysicalSeat::from))
    }

    async fn list_physical_seats(&self, aircraft_id: Uuid) -> CoreResult<Vec<PhysicalSeat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, aircraft_id, seat_row, seat_column, active
            FROM physical_seats
            WHERE aircraft_id = $1
            ORDER BY seat_row, seat_column
            "#,
        )
        .bind(aircraft_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(PhysicalSeat::from).collect())
    }

    async fn save_itinerary(&self, itinerary: &FlightItinerary) -> CoreResult<()> {
        let f = &itinerary.flight;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO flights (id, code, origin, destination, departure_at, arrival_at, aircraft_id, distance_km, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                origin = EXCLUDED.origin,
                destination = EXCLUDED.destination,
                departure_at = EXCLUDED.departure_at,
                arrival_at = EXCLUDED.arrival_at,
                aircraft_id = EXCLUDED.aircraft_id,
                distance_km = EXCLUDED.distance_km,
                active = EXCLUDED.active
            "#,
        )
        .bind(f.id)
        .bind(&f.code)
        .bind(&f.origin)
        .bind(&f.destination)
        .bind(f.departure_at)
        .bind(f.arrival_at)
        .bind(f.aircraft_id)
        .bind(f.distance_km)
        .bind(f.active)
        .bind(f.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        // Legs dropped from the itinerary are deactivated, not deleted:
        // seat offers may still point at them.
        let leg_ids: Vec<Uuid> = itinerary.legs.iter().map(|l| l.id).collect();
        sqlx::query("UPDATE flight_legs SET active = FALSE WHERE flight_id = $1 AND NOT (id = ANY($2))")
            .bind(f.id)
            .bind(&leg_ids)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        for leg in &itinerary.legs {
            sqlx::query(
                r#"
                INSERT INTO flight_legs (id, flight_id, leg_order, origin, destination, departure_at, arrival_at, aircraft_id, distance_km, active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    leg_order = EXCLUDED.leg_order,
                    origin = EXCLUDED.origin,
                    destination = EXCLUDED.destination,
                    departure_at = EXCLUDED.departure_at,
                    arrival_at = EXCLUDED.arrival_at,
                    aircraft_id = EXCLUDED.aircraft_id,
                    distance_km = EXCLUDED.distance_km,
                    active = EXCLUDED.active
                "#,
            )
            .bind(leg.id)
            .bind(leg.flight_id)
            .bind(leg.leg_order)
            .bind(&leg.origin)
            .bind(&leg.destination)
            .bind(leg.departure_at)
            .bind(leg.arrival_at)
            .bind(leg.aircraft_id)
            .bind(leg.distance_km)
            .bind(leg.active)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)
    }

    async fn get_itinerary(&self, flight_id: Uuid) -> CoreResult<Option<FlightItinerary>> {
        let flight = sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS))
            .bind(flight_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        let Some(flight) = flight else {
            return Ok(None);
        };

        let legs = sqlx::query_as::<_, LegRow>(
            r#"
            SELECT id, flight_id, leg_order, origin, destination, departure_at, arrival_at, aircraft_id, distance_km, active
            FROM flight_legs
            WHERE flight_id = $1 AND active
            ORDER BY leg_order
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(Some(FlightItinerary::with_legs(
            flight.into(),
            legs.into_iter().map(FlightLeg::from).collect(),
        )))
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {} FROM flights WHERE active ORDER BY departure_at",
            FLIGHT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn get_booking_config(&self, flight_id: Uuid) -> CoreResult<Option<FlightBookingConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT flight_id, configured, configured_by, configured_at, configured_seat_count, enabled_seat_count
            FROM flight_booking_configs
            WHERE flight_id = $1
            "#,
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(FlightBookingConfig::from))
    }

    async fn save_booking_config(&self, config: &FlightBookingConfig) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flight_booking_configs
                (flight_id, configured, configured_by, configured_at, configured_seat_count, enabled_seat_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (flight_id) DO UPDATE SET
                configured = EXCLUDED.configured,
                configured_by = EXCLUDED.configured_by,
                configured_at = EXCLUDED.configured_at,
                configured_seat_count = EXCLUDED.configured_seat_count,
                enabled_seat_count = EXCLUDED.enabled_seat_count
            "#,
        )
        .bind(config.flight_id)
        .bind(config.configured)
        .bind(&config.configured_by)
        .bind(config.configured_at)
        .bind(config.configured_seat_count)
        .bind(config.enabled_seat_count)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn upsert_seat_offer(&self, offer: &SeatOffer) -> CoreResult<SeatOffer> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            r#"
            INSERT INTO seat_offers
                (id, flight_id, leg_id, physical_seat_id, seat_number, seat_class, price_cents, sellable, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $9)
            ON CONFLICT (flight_id, physical_seat_id, COALESCE(leg_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET
                seat_class = EXCLUDED.seat_class,
                price_cents = EXCLUDED.price_cents,
                sellable = EXCLUDED.sellable,
                active = TRUE,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            OFFER_COLUMNS
        ))
        .bind(offer.id)
        .bind(offer.flight_id)
        .bind(offer.leg_id)
        .bind(offer.physical_seat_id)
        .bind(&offer.seat_number)
        .bind(offer.seat_class.as_str())
        .bind(offer.price_cents)
        .bind(offer.sellable)
        .bind(offer.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;
        SeatOffer::try_from(row)
    }

    async fn get_seat_offer(&self, id: Uuid) -> CoreResult<Option<SeatOffer>> {
        sqlx::query_as::<_, OfferRow>(&format!("SELECT {} FROM seat_offers WHERE id = $1", OFFER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(SeatOffer::try_from)
            .transpose()
    }

    async fn list_seat_offers(&self, flight_id: Uuid) -> CoreResult<Vec<SeatOffer>> {
        sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {} FROM seat_offers WHERE flight_id = $1",
            OFFER_COLUMNS
        ))
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?
        .into_iter()
        .map(SeatOffer::try_from)
        .collect()
    }

    async fn set_seat_offer_active(&self, id: Uuid, active: bool) -> CoreResult<()> {
        let result = sqlx::query("UPDATE seat_offers SET active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("SeatOffer", id));
        }
        Ok(())
    }

    async fn held_seat_offer_ids(&self, flight_id: Uuid) -> CoreResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT ss.seat_offer_id
            FROM seat_selections ss
            JOIN reservations r ON r.id = ss.reservation_id
            WHERE r.flight_id = $1 AND r.active AND r.status IN ('CRE', 'RSP', 'CON')
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(ids.into_iter().collect())
    }
}
