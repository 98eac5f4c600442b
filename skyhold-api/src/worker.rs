use skyhold_order::{ExpirationScheduler, SweepOptions};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Runs the expiration sweep forever, one pass per `interval_seconds`.
/// A pass that overruns delays the next tick instead of stacking up.
pub async fn start_expiration_worker(scheduler: Arc<ExpirationScheduler>, interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Expiration worker started, sweeping every {}s", interval_seconds);

    loop {
        ticker.tick().await;
        match scheduler.run(&SweepOptions::default()).await {
            Ok(report) if report.processed > 0 => info!(
                processed = report.processed,
                deleted = report.deleted,
                expired = report.expired,
                cancelled = report.cancelled,
                reminders = report.reminders_sent,
                errors = report.errors,
                "Expiration sweep finished"
            ),
            Ok(_) => debug!("Expiration sweep found nothing to do"),
            Err(e) => error!("Expiration sweep failed: {}", e),
        }
    }
}
