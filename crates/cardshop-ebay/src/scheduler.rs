//! # Sync Scheduler
//!
//! Background task that starts a scheduled sync once the configured
//! interval has passed since the last successful one.
//!
//! ```text
//!   every scheduler_tick:
//!     credentials? connected? ──no──► skip
//!     last_sync + interval <= now ──no──► skip
//!     last run failed within interval ──yes──► skip
//!     SyncEngine::run(Scheduled)
//! ```
//!
//! A cron entry running `cardshop sync` still works alongside it; the
//! sync lease keeps the two from overlapping.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::{SyncEngine, SyncOutcome};
use cardshop_core::{SyncRunStatus, SyncTrigger};

/// Periodic sync driver.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    tick: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl SyncScheduler {
    /// Creates a scheduler and returns a handle.
    pub fn new(engine: Arc<SyncEngine>, tick: Duration) -> (Self, SchedulerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = SyncScheduler {
            engine,
            tick,
            shutdown_rx,
        };
        (scheduler, SchedulerHandle { shutdown_tx })
    }

    /// Runs the scheduler loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(tick_secs = self.tick.as_secs(), "Sync scheduler starting");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(outcome) = self.tick_once().await {
                        debug!(success = outcome.success, "Scheduled sync finished");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync scheduler shutting down");
                    break;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Runs a sync if one is due. Returns the outcome when a run was attempted.
    pub async fn tick_once(&self) -> Option<SyncOutcome> {
        let settings = match self.engine.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(?e, "Scheduler could not load settings");
                return None;
            }
        };

        if settings.require_sync_ready().is_err() || !settings.is_connected() {
            debug!("eBay not configured, scheduled sync skipped");
            return None;
        }

        let now = Utc::now();
        if !settings.sync_due(now) {
            debug!(last_sync = ?settings.last_sync, "Scheduled sync not due");
            return None;
        }

        let interval = ChronoDuration::hours(settings.sync_interval_hours);
        match self.engine.db().sync_runs().latest(1).await {
            Ok(runs) => {
                if let Some(run) = runs.first() {
                    if run.status == SyncRunStatus::Failed && run.started_at + interval > now {
                        debug!(run_id = %run.id, "Last sync failed recently, waiting for next interval");
                        return None;
                    }
                }
            }
            Err(e) => {
                error!(?e, "Scheduler could not read sync history");
                return None;
            }
        }

        info!("Starting scheduled sync");
        Some(self.engine.run(SyncTrigger::Scheduled).await)
    }
}
