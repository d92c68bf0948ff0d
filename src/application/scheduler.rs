//! # Sync Scheduler
//!
//! Fires a full-enrichment sync once at process start, then a lightweight
//! refresh on a fixed interval. Firings are independent: a failed run is
//! logged and never prevents the next one. A run guard ensures two sync
//! passes can never interleave -- both would contend for the same
//! marketplace sessions, and the existence pre-check is not atomic with the
//! eventual insert.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::sync_orchestrator::CatalogSyncOrchestrator;
use crate::infrastructure::config::SyncScheduleConfig;

pub struct SyncScheduler {
    orchestrator: Arc<CatalogSyncOrchestrator>,
    interval: Duration,
    drift_report: bool,
    run_guard: Mutex<()>,
    cancellation_token: CancellationToken,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<CatalogSyncOrchestrator>, config: &SyncScheduleConfig) -> Self {
        Self {
            orchestrator,
            interval: Duration::from_secs(config.interval_hours * 3600),
            drift_report: config.drift_report,
            run_guard: Mutex::new(()),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Token observed by the scheduling loop; cancel it to shut down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Run the scheduling loop until cancelled: one full sync at startup,
    /// then lightweight refreshes every interval.
    pub async fn run(&self) {
        self.run_once(false).await;

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup sync already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("scheduler shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once(true).await;
                }
            }
        }
    }

    /// Execute one scheduled firing. Skipped when a previous run is still in
    /// progress.
    pub async fn run_once(&self, lightweight: bool) {
        let Ok(_guard) = self.run_guard.try_lock() else {
            warn!("previous sync run still in progress, skipping this firing");
            return;
        };

        match self.orchestrator.sync(lightweight).await {
            Ok(summary) => {
                info!(
                    run_id = %summary.run_id,
                    inserted = summary.inserted,
                    skipped = summary.skipped_existing,
                    failed = summary.failed.len(),
                    "scheduled sync firing completed"
                );
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "sync run failed; next firing unaffected");
            }
        }

        if lightweight && self.drift_report {
            if let Err(e) = self.orchestrator.report_price_drift().await {
                warn!(error = %format!("{e:#}"), "price drift report failed");
            }
        }
    }
}
