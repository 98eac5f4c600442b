use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyhold_shared::pii::{mask_email, Masked};
use uuid::Uuid;

use crate::CoreResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    #[serde(rename = "reminder_48h")]
    Reminder48h,
    #[serde(rename = "cancellation_by_expiry")]
    CancellationByExpiry,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder48h => "reminder_48h",
            NotificationKind::CancellationByExpiry => "cancellation_by_expiry",
        }
    }
}

/// Everything a mail template needs about a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationNotice {
    pub kind: NotificationKind,
    pub reservation_id: Uuid,
    pub code: String,
    pub passenger_name: String,
    pub passenger_email: Masked<String>,
    pub flight_code: String,
    pub departure_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub total_cents: i64,
}

/// Best-effort outbound channel. Failures are reported, never retried here.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notice: &ReservationNotice) -> CoreResult<()>;
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send(&self, notice: &ReservationNotice) -> CoreResult<()> {
        tracing::info!(
            kind = notice.kind.as_str(),
            reservation = %notice.code,
            recipient = %mask_email(notice.passenger_email.expose()),
            "Notification queued for flight {} (deadline {})",
            notice.flight_code,
            notice.payment_deadline
        );
        Ok(())
    }
}
