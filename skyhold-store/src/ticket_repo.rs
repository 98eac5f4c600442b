use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skyhold_core::{CoreError, CoreResult};
use skyhold_order::{Ticket, TicketRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{storage_error, unique_violation};

pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    reservation_id: Uuid,
    barcode: String,
    flight_snapshot: Value,
    seat_snapshot: Value,
    passenger_snapshot: Value,
    issued_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            reservation_id: row.reservation_id,
            barcode: row.barcode,
            flight_snapshot: row.flight_snapshot,
            seat_snapshot: row.seat_snapshot,
            passenger_snapshot: row.passenger_snapshot,
            issued_at: row.issued_at,
            used: row.used,
            used_at: row.used_at,
        }
    }
}

const TICKET_COLUMNS: &str =
    "id, reservation_id, barcode, flight_snapshot, seat_snapshot, passenger_snapshot, issued_at, used, used_at";

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn insert_if_absent(&self, ticket: &Ticket) -> CoreResult<Ticket> {
        let inserted = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            INSERT INTO tickets (id, reservation_id, barcode, flight_snapshot, seat_snapshot, passenger_snapshot, issued_at, used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)
            ON CONFLICT (reservation_id) DO NOTHING
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(ticket.id)
        .bind(ticket.reservation_id)
        .bind(&ticket.barcode)
        .bind(&ticket.flight_snapshot)
        .bind(&ticket.seat_snapshot)
        .bind(&ticket.passenger_snapshot)
        .bind(ticket.issued_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => CoreError::DuplicateCode(ticket.barcode.clone()),
            None => storage_error(e),
        })?;

        match inserted {
            Some(row) => Ok(row.into()),
            // Lost the race: another confirmation already issued this ticket.
            None => self
                .find_by_reservation(ticket.reservation_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Ticket", ticket.reservation_id)),
        }
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(Ticket::from))
    }

    async fn find_by_reservation(&self, reservation_id: Uuid) -> CoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE reservation_id = $1",
            TICKET_COLUMNS
        ))
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(row.map(Ticket::from))
    }

    async fn find_by_barcode(&self, barcode: &str) -> CoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!("SELECT {} FROM tickets WHERE barcode = $1", TICKET_COLUMNS))
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(Ticket::from))
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Ticket>> {
        sqlx::query("UPDATE tickets SET used = TRUE, used_at = $2 WHERE id = $1 AND NOT used")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        self.get(id).await
    }
}
