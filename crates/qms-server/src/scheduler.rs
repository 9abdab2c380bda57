//! In-process timer for the reminder sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use qms_db::service::QmsService;

const SECONDS_PER_HOUR: u64 = 3600;

/// Run the reminder sweep every `interval_hours`, first tick one interval
/// after startup. Failed sweeps are logged and retried on the next tick.
pub fn spawn_reminder_sweep(service: Arc<QmsService>, interval_hours: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_hours.max(1) * SECONDS_PER_HOUR);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let today = chrono::Utc::now().date_naive();
            match service.run_reminder_sweep(today).await {
                Ok(report) => tracing::info!(
                    %today,
                    candidates = report.candidates,
                    sent = report.sent,
                    failed = report.failed,
                    "scheduled reminder sweep finished"
                ),
                Err(err) => tracing::error!(error = %err, "scheduled reminder sweep failed"),
            }
        }
    })
}
