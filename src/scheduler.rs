//! Background driver for the reminder sweep.
//!
//! Waits out a short warm-up delay, sweeps once, then sweeps again on every
//! interval tick until stopped. A tick that lands while a sweep is still
//! running is dropped.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::services::reminder_service::ReminderService;

/// Handle to a running reminder scheduler
pub struct ReminderScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderScheduler {
    /// Spawn the scheduler loop on the current tokio runtime
    pub fn start(service: Arc<dyn ReminderService>, config: SchedulerConfig) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = config.interval.as_secs(),
                initial_delay_secs = config.initial_delay.as_secs(),
                "Reminder scheduler started"
            );

            tokio::select! {
                _ = sleep(config.initial_delay) => {}
                _ = stop.changed() => {
                    info!("Reminder scheduler stopped before first sweep");
                    return;
                }
            }

            // First tick completes immediately
            let mut ticker = interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => run_scheduled_sweep(service.as_ref()).await,
                    _ = stop.changed() => break,
                }
            }

            info!("Reminder scheduler stopped");
        });

        Self { shutdown, task }
    }

    /// Signal the loop to exit and wait for it. An in-flight sweep finishes first.
    pub async fn stop(self) {
        // Send only fails when the loop already exited
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Reminder scheduler task failed");
        }
    }
}

async fn run_scheduled_sweep(service: &dyn ReminderService) {
    debug!("Running scheduled reminder sweep");

    match service.try_run_sweep(Utc::now()).await {
        None => debug!("Scheduled sweep skipped: another sweep is running"),
        Some(Ok(report)) => debug!(
            found = report.found,
            sent = report.sent,
            failed = report.failed,
            "Scheduled reminder sweep completed"
        ),
        Some(Err(e)) => warn!(error = %e, "Scheduled reminder sweep failed"),
    }
}
