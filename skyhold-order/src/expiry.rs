use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use skyhold_core::events::EventPublisher;
use skyhold_core::notification::{NotificationKind, NotificationSender, ReservationNotice};
use skyhold_core::{Clock, CoreResult};
use skyhold_shared::models::events::{ReservationCancelledEvent, TOPIC_RESERVATIONS};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::lifecycle::ReservationStatus;
use crate::repository::{ReservationRepository, StatusChange, SweepCandidate};

/// What happens to open reservations once the flight is inside the
/// purge window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseWindowAction {
    /// Remove the reservation and its selections.
    Delete,
    /// Keep the row, move it to Expired.
    Expire,
}

#[derive(Debug, Clone)]
pub struct ExpiryRules {
    pub purge_window: Duration,
    pub reminder_band_start: Duration,
    pub reminder_band_end: Duration,
    pub close_window_action: CloseWindowAction,
    pub default_limit: usize,
}

impl Default for ExpiryRules {
    fn default() -> Self {
        Self {
            purge_window: Duration::hours(24),
            reminder_band_start: Duration::hours(48),
            reminder_band_end: Duration::hours(72),
            close_window_action: CloseWindowAction::Delete,
            default_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Delete,
    Expire,
    Cancel,
    Remind,
    Skip,
}

/// Rules are evaluated in order; the first match wins.
///
/// 1. departure within the purge window: delete (or expire)
/// 2. payment deadline passed: cancel
/// 3. deadline 48h..=72h away and no reminder yet: remind
pub fn decide(
    rules: &ExpiryRules,
    departure_at: DateTime<Utc>,
    payment_deadline: DateTime<Utc>,
    reminder_sent: bool,
    now: DateTime<Utc>,
) -> SweepAction {
    let to_departure = departure_at - now;
    let to_deadline = payment_deadline - now;

    if to_departure <= rules.purge_window {
        match rules.close_window_action {
            CloseWindowAction::Delete => SweepAction::Delete,
            CloseWindowAction::Expire => SweepAction::Expire,
        }
    } else if now > payment_deadline {
        SweepAction::Cancel
    } else if !reminder_sent && to_deadline >= rules.reminder_band_start && to_deadline <= rules.reminder_band_end {
        SweepAction::Remind
    } else {
        SweepAction::Skip
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepOptions {
    /// Decide and count, but write nothing and send nothing.
    #[serde(default)]
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub reservation_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub dry_run: bool,
    pub processed: usize,
    pub deleted: usize,
    pub expired: usize,
    pub cancelled: usize,
    pub reminders_sent: usize,
    pub cancellation_notices: usize,
    pub skipped: usize,
    /// Reservations another actor changed between selection and update.
    pub already_processed: usize,
    pub errors: usize,
}

/// Periodic sweep over open reservations. Safe to run repeatedly and
/// concurrently: every write is a guarded update.
pub struct ExpirationScheduler {
    reservations: Arc<dyn ReservationRepository>,
    notifier: Arc<dyn NotificationSender>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    rules: ExpiryRules,
}

enum Outcome {
    Deleted,
    Expired,
    Cancelled { notified: bool },
    Reminded,
    Skipped,
    AlreadyProcessed,
}

impl ExpirationScheduler {
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        notifier: Arc<dyn NotificationSender>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        rules: ExpiryRules,
    ) -> Self {
        Self {
            reservations,
            notifier,
            events,
            clock,
            rules,
        }
    }

    pub fn rules(&self) -> &ExpiryRules {
        &self.rules
    }

    pub async fn run(&self, options: &SweepOptions) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let limit = options.limit.unwrap_or(self.rules.default_limit);
        let code = options.reservation_code.as_deref().map(|c| c.trim().to_uppercase());

        let candidates = self
            .reservations
            .sweep_candidates(now - self.rules.purge_window, limit, code.as_deref())
            .await?;

        let mut report = SweepReport {
            dry_run: options.dry_run,
            ..SweepReport::default()
        };

        for candidate in &candidates {
            report.processed += 1;
            let action = decide(
                &self.rules,
                candidate.departure_at,
                candidate.reservation.payment_deadline,
                candidate.reservation.reminder_sent,
                now,
            );

            if options.dry_run {
                debug!("[dry-run] {:?} reservation {}", action, candidate.reservation.code);
                count_dry_run(&mut report, action);
                continue;
            }

            match self.apply(candidate, action, now).await {
                Ok(Outcome::Deleted) => report.deleted += 1,
                Ok(Outcome::Expired) => report.expired += 1,
                Ok(Outcome::Cancelled { notified }) => {
                    report.cancelled += 1;
                    if notified {
                        report.cancellation_notices += 1;
                    } else {
                        report.errors += 1;
                    }
                }
                Ok(Outcome::Reminded) => report.reminders_sent += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::AlreadyProcessed) => report.already_processed += 1,
                Err(e) => {
                    error!(
                        "Sweep failed for reservation {} ({}): {}",
                        candidate.reservation.code, candidate.reservation.id, e
                    );
                    report.errors += 1;
                }
            }
        }

        info!(
            "Expiration sweep done: processed={} deleted={} expired={} cancelled={} reminders={} errors={}{}",
            report.processed,
            report.deleted,
            report.expired,
            report.cancelled,
            report.reminders_sent,
            report.errors,
            if report.dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }

    async fn apply(&self, candidate: &SweepCandidate, action: SweepAction, now: DateTime<Utc>) -> CoreResult<Outcome> {
        let reservation = &candidate.reservation;
        match action {
            SweepAction::Skip => Ok(Outcome::Skipped),

            SweepAction::Delete => {
                if self.reservations.delete(reservation.id, Some(&ReservationStatus::OPEN)).await? {
                    info!(
                        "Reservation {} deleted: flight {} departs at {}",
                        reservation.code, candidate.flight_code, candidate.departure_at
                    );
                    self.publish_cancelled(candidate, "DEPARTURE_WINDOW", now).await;
                    Ok(Outcome::Deleted)
                } else {
                    Ok(Outcome::AlreadyProcessed)
                }
            }

            SweepAction::Expire => {
                let change = StatusChange::new(&ReservationStatus::OPEN, ReservationStatus::Expired, now);
                match self.reservations.apply_status(reservation.id, change).await? {
                    Some(_) => {
                        info!("Reservation {} expired before departure", reservation.code);
                        self.publish_cancelled(candidate, "DEPARTURE_WINDOW", now).await;
                        Ok(Outcome::Expired)
                    }
                    None => Ok(Outcome::AlreadyProcessed),
                }
            }

            SweepAction::Cancel => {
                let change = StatusChange::new(&ReservationStatus::OPEN, ReservationStatus::Cancelled, now);
                let cancelled = match self.reservations.apply_status(reservation.id, change).await? {
                    Some(r) => r,
                    None => return Ok(Outcome::AlreadyProcessed),
                };
                info!(
                    "Reservation {} cancelled: payment deadline {} passed",
                    cancelled.code, cancelled.payment_deadline
                );
                self.publish_cancelled(candidate, "PAYMENT_DEADLINE", now).await;

                let notice = notice(candidate, NotificationKind::CancellationByExpiry);
                let notified = match self.notifier.send(&notice).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Cancellation notice for {} not delivered: {}", cancelled.code, e);
                        false
                    }
                };
                Ok(Outcome::Cancelled { notified })
            }

            SweepAction::Remind => {
                if !self.reservations.claim_reminder(reservation.id, now).await? {
                    return Ok(Outcome::AlreadyProcessed);
                }
                let notice = notice(candidate, NotificationKind::Reminder48h);
                if let Err(e) = self.notifier.send(&notice).await {
                    self.reservations.release_reminder(reservation.id).await?;
                    return Err(e);
                }
                info!(
                    "Payment reminder sent for reservation {} (deadline {})",
                    reservation.code, reservation.payment_deadline
                );
                Ok(Outcome::Reminded)
            }
        }
    }

    async fn publish_cancelled(&self, candidate: &SweepCandidate, reason: &str, now: DateTime<Utc>) {
        let event = ReservationCancelledEvent {
            reservation_id: candidate.reservation.id,
            code: candidate.reservation.code.clone(),
            flight_id: candidate.reservation.flight_id,
            reason: reason.to_string(),
            note: None,
            timestamp: now.timestamp(),
        };
        let payload = match serde_json::to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize cancellation of {}: {}", event.code, e);
                return;
            }
        };
        if let Err(e) = self.events.publish(TOPIC_RESERVATIONS, &event.code, &payload).await {
            warn!("Failed to publish cancellation of {}: {}", event.code, e);
        }
    }
}

fn notice(candidate: &SweepCandidate, kind: NotificationKind) -> ReservationNotice {
    let r = &candidate.reservation;
    ReservationNotice {
        kind,
        reservation_id: r.id,
        code: r.code.clone(),
        passenger_name: r.passenger_name.clone(),
        passenger_email: r.passenger_email.clone(),
        flight_code: candidate.flight_code.clone(),
        departure_at: candidate.departure_at,
        payment_deadline: r.payment_deadline,
        total_cents: r.total_cents,
    }
}

fn count_dry_run(report: &mut SweepReport, action: SweepAction) {
    match action {
        SweepAction::Delete => report.deleted += 1,
        SweepAction::Expire => report.expired += 1,
        SweepAction::Cancel => report.cancelled += 1,
        SweepAction::Remind => report.reminders_sent += 1,
        SweepAction::Skip => report.skipped += 1,
    }
}
