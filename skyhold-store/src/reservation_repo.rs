use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skyhold_catalog::SeatOffer;
use skyhold_core::payment::PaymentReceipt;
use skyhold_core::{CoreError, CoreResult};
use skyhold_order::repository::{ReservationDraft, ReservationRepository, StatusChange, SweepCandidate};
use skyhold_order::{Reservation, ReservationStatus, SeatSelection};
use skyhold_shared::pii::Masked;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::catalog_repo::{parse_seat_class, OfferRow, OFFER_COLUMNS};
use crate::database::{storage_error, unique_violation};

pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    code: String,
    flight_id: Uuid,
    passenger_id: String,
    passenger_name: String,
    passenger_email: String,
    status: String,
    total_cents: i64,
    payment_deadline: DateTime<Utc>,
    reminder_sent: bool,
    reminder_sent_at: Option<DateTime<Utc>>,
    active: bool,
    payment: Option<Json<PaymentReceipt>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SelectionRow {
    id: Uuid,
    reservation_id: Uuid,
    seat_offer_id: Uuid,
    leg_id: Option<Uuid>,
    seat_number: String,
    seat_class: String,
    price_cents: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    #[sqlx(flatten)]
    reservation: ReservationRow,
    flight_code: String,
    flight_departure_at: DateTime<Utc>,
}

const RESERVATION_COLUMNS: &str = "r.id, r.code, r.flight_id, r.passenger_id, r.passenger_name, r.passenger_email, \
     r.status, r.total_cents, r.payment_deadline, r.reminder_sent, r.reminder_sent_at, r.active, r.payment, \
     r.paid_at, r.created_at, r.updated_at";

fn status_codes(statuses: &[ReservationStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.code().to_string()).collect()
}

impl SelectionRow {
    fn into_selection(self) -> CoreResult<SeatSelection> {
        Ok(SeatSelection {
            id: self.id,
            reservation_id: self.reservation_id,
            seat_offer_id: self.seat_offer_id,
            leg_id: self.leg_id,
            seat_number: self.seat_number,
            seat_class: parse_seat_class(&self.seat_class)?,
            price_cents: self.price_cents,
            created_at: self.created_at,
        })
    }
}

impl ReservationRow {
    fn into_reservation(self, selections: Vec<SeatSelection>) -> CoreResult<Reservation> {
        Ok(Reservation {
            id: self.id,
            code: self.code,
            flight_id: self.flight_id,
            passenger_id: self.passenger_id,
            passenger_name: self.passenger_name,
            passenger_email: Masked(self.passenger_email),
            status: ReservationStatus::from_code(self.status.trim())?,
            selections,
            total_cents: self.total_cents,
            payment_deadline: self.payment_deadline,
            reminder_sent: self.reminder_sent,
            reminder_sent_at: self.reminder_sent_at,
            active: self.active,
            payment: self.payment.map(|p| p.0),
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PgReservationRepository {
    /// Attach selections to each row with one extra query.
    async fn hydrate(&self, rows: Vec<ReservationRow>) -> CoreResult<Vec<Reservation>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let selection_rows = sqlx::query_as::<_, SelectionRow>(
            r#"
            SELECT id, reservation_id, seat_offer_id, leg_id, seat_number, seat_class, price_cents, created_at
            FROM seat_selections
            WHERE reservation_id = ANY($1)
            ORDER BY created_at, seat_number
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut by_reservation: HashMap<Uuid, Vec<SeatSelection>> = HashMap::new();
        for row in selection_rows {
            by_reservation
                .entry(row.reservation_id)
                .or_default()
                .push(row.into_selection()?);
        }

        rows.into_iter()
            .map(|row| {
                let selections = by_reservation.remove(&row.id).unwrap_or_default();
                row.into_reservation(selections)
            })
            .collect()
    }

    async fn fetch_one(&self, row: Option<ReservationRow>) -> CoreResult<Option<Reservation>> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn fetch_all_where(&self, clause: &str, key: &str) -> CoreResult<Vec<Reservation>> {
        let sql = format!("SELECT {} FROM reservations r WHERE {}", RESERVATION_COLUMNS, clause);
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        self.hydrate(rows).await
    }
}

/// Lock the requested offers in ascending id order, then verify each one is
/// on this flight, on sale, and not held by a blocking reservation.
async fn lock_and_select(
    tx: &mut Transaction<'_, Postgres>,
    flight_id: Uuid,
    seat_offer_ids: &[Uuid],
    reservation_id: Uuid,
    at: DateTime<Utc>,
) -> CoreResult<Vec<SeatSelection>> {
    let mut sorted = seat_offer_ids.to_vec();
    sorted.sort();

    let offers: HashMap<Uuid, SeatOffer> = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {} FROM seat_offers WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        OFFER_COLUMNS
    ))
    .bind(&sorted)
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_error)?
    .into_iter()
    .map(|row| SeatOffer::try_from(row).map(|o| (o.id, o)))
    .collect::<CoreResult<_>>()?;

    let held: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT ss.seat_offer_id
        FROM seat_selections ss
        JOIN reservations r ON r.id = ss.reservation_id
        WHERE ss.seat_offer_id = ANY($1) AND r.active AND r.status IN ('CRE', 'RSP', 'CON')
        "#,
    )
    .bind(&sorted)
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_error)?
    .into_iter()
    .collect();

    let mut selections = Vec::with_capacity(sorted.len());
    for id in sorted {
        let offer = offers
            .get(&id)
            .filter(|o| o.flight_id == flight_id)
            .ok_or_else(|| CoreError::Validation(format!("seat offer {} is not part of this flight", id)))?;
        if !offer.is_bookable() || held.contains(&id) {
            return Err(CoreError::SeatUnavailable {
                seat_number: offer.seat_number.clone(),
                seat_offer_id: id,
            });
        }
        selections.push(SeatSelection {
            id: Uuid::new_v4(),
            reservation_id,
            seat_offer_id: id,
            leg_id: offer.leg_id,
            seat_number: offer.seat_number.clone(),
            seat_class: offer.seat_class,
            price_cents: offer.price_cents,
            created_at: at,
        });
    }
    Ok(selections)
}

async fn insert_selections(tx: &mut Transaction<'_, Postgres>, selections: &[SeatSelection]) -> CoreResult<()> {
    for s in selections {
        sqlx::query(
            r#"
            INSERT INTO seat_selections (id, reservation_id, seat_offer_id, leg_id, seat_number, seat_class, price_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.id)
        .bind(s.reservation_id)
        .bind(s.seat_offer_id)
        .bind(s.leg_id)
        .bind(&s.seat_number)
        .bind(s.seat_class.as_str())
        .bind(s.price_cents)
        .bind(s.created_at)
        .execute(&mut **tx)
        .await
        .map_err(storage_error)?;
    }
    Ok(())
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn create_reservation(&self, draft: ReservationDraft) -> CoreResult<Reservation> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        if draft.single_active_per_flight {
            // Serializes concurrent creations for the same passenger and flight.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!("{}:{}", draft.passenger_id, draft.flight_id))
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;

            let existing: Option<String> = sqlx::query_scalar(
                r#"
                SELECT f.code
                FROM reservations r
                JOIN flights f ON f.id = r.flight_id
                WHERE r.passenger_id = $1 AND r.flight_id = $2 AND r.active AND r.status IN ('CRE', 'RSP', 'CON')
                LIMIT 1
                "#,
            )
            .bind(&draft.passenger_id)
            .bind(draft.flight_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_error)?;
            if let Some(flight_code) = existing {
                return Err(CoreError::DuplicateReservation(flight_code));
            }
        }

        let selections = lock_and_select(
            &mut tx,
            draft.flight_id,
            &draft.seat_offer_ids,
            draft.id,
            draft.created_at,
        )
        .await?;
        let total_cents: i64 = selections.iter().map(|s| s.price_cents).sum();

        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, code, flight_id, passenger_id, passenger_name, passenger_email, status, total_cents,
                 payment_deadline, reminder_sent, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, TRUE, $10, $10)
            "#,
        )
        .bind(draft.id)
        .bind(&draft.code)
        .bind(draft.flight_id)
        .bind(&draft.passenger_id)
        .bind(&draft.passenger_name)
        .bind(draft.passenger_email.expose())
        .bind(ReservationStatus::Created.code())
        .bind(total_cents)
        .bind(draft.payment_deadline)
        .bind(draft.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => CoreError::DuplicateCode(draft.code.clone()),
            None => storage_error(e),
        })?;

        insert_selections(&mut tx, &selections).await?;
        tx.commit().await.map_err(storage_error)?;

        debug!("Reservation {} stored with {} seats", draft.code, selections.len());
        self.get(draft.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", draft.id))
    }

    async fn attach_seats(&self, reservation_id: Uuid, seat_offer_ids: &[Uuid], at: DateTime<Utc>) -> CoreResult<Reservation> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let current: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT flight_id, status FROM reservations WHERE id = $1 AND active FOR UPDATE",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;
        let (flight_id, status) = current.ok_or_else(|| CoreError::not_found("Reservation", reservation_id))?;
        let status = ReservationStatus::from_code(status.trim())?;
        if status != ReservationStatus::Created {
            return Err(CoreError::InvalidTransition {
                from: status.to_string(),
                to: ReservationStatus::Created.to_string(),
            });
        }

        let selections = lock_and_select(&mut tx, flight_id, seat_offer_ids, reservation_id, at).await?;
        insert_selections(&mut tx, &selections).await?;

        sqlx::query(
            r#"
            UPDATE reservations
            SET total_cents = (SELECT COALESCE(SUM(price_cents), 0) FROM seat_selections WHERE reservation_id = $1),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(reservation_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        self.get(reservation_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Reservation", reservation_id))
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations r WHERE r.id = $1", RESERVATION_COLUMNS);
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        self.fetch_one(row).await
    }

    async fn find_by_code(&self, code: &str) -> CoreResult<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations r WHERE r.code = $1", RESERVATION_COLUMNS);
        let row = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        self.fetch_one(row).await
    }

    async fn list_for_passenger(&self, passenger_id: &str) -> CoreResult<Vec<Reservation>> {
        self.fetch_all_where("r.passenger_id = $1 ORDER BY r.created_at DESC", passenger_id)
            .await
    }

    async fn list_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations r WHERE r.flight_id = $1 ORDER BY r.created_at",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReservationRow>(&sql)
            .bind(flight_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        self.hydrate(rows).await
    }

    async fn apply_status(&self, id: Uuid, change: StatusChange) -> CoreResult<Option<Reservation>> {
        let paid_at = change.payment.as_ref().map(|_| change.at);
        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE reservations
            SET status = $2,
                active = $3,
                payment = COALESCE($4, payment),
                paid_at = COALESCE($5, paid_at),
                updated_at = $6
            WHERE id = $1 AND status = ANY($7)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(change.to.code())
        .bind(change.active)
        .bind(change.payment.map(Json))
        .bind(paid_at)
        .bind(change.at)
        .bind(status_codes(&change.expected))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match updated {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid, expected: Option<&[ReservationStatus]>) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1 AND ($2::text[] IS NULL OR status = ANY($2))")
            .bind(id)
            .bind(expected.map(status_codes))
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_reminder(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET reminder_sent = TRUE, reminder_sent_at = $2, updated_at = $2
            WHERE id = $1 AND NOT reminder_sent AND active AND status IN ('CRE', 'RSP')
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_reminder(&self, id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE reservations SET reminder_sent = FALSE, reminder_sent_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn sweep_candidates(
        &self,
        departing_after: DateTime<Utc>,
        limit: usize,
        code: Option<&str>,
    ) -> CoreResult<Vec<SweepCandidate>> {
        let sql = format!(
            r#"
            SELECT {}, f.code AS flight_code, f.departure_at AS flight_departure_at
            FROM reservations r
            JOIN flights f ON f.id = r.flight_id
            WHERE r.active
              AND r.status IN ('CRE', 'RSP')
              AND f.departure_at > $1
              AND ($2::text IS NULL OR r.code = $2)
            ORDER BY f.departure_at, r.created_at
            LIMIT $3
            "#,
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(departing_after)
            .bind(code)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        let mut flights = Vec::with_capacity(rows.len());
        let mut reservation_rows = Vec::with_capacity(rows.len());
        for row in rows {
            flights.push((row.flight_code, row.flight_departure_at));
            reservation_rows.push(row.reservation);
        }
        let reservations = self.hydrate(reservation_rows).await?;

        Ok(reservations
            .into_iter()
            .zip(flights)
            .map(|(reservation, (flight_code, departure_at))| SweepCandidate {
                reservation,
                flight_code,
                departure_at,
            })
            .collect())
    }
}
