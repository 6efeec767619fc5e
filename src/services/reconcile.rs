//! Reconciliation sweep for images stuck in `pending`.
//!
//! Recovers records whose message was never published or was lost between an
//! offset commit and processing.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::UpdateOutcome;
use crate::error::AppResult;

use super::ImagePipeline;

/// `tokio::time::interval` panics on a zero period.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the reconciliation sweep.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How often to run the sweep
    pub interval: Duration,
    /// Pending records untouched for this long are considered stuck
    pub stale_after: Duration,
    /// Requeues allowed before a record is marked failed
    pub max_requeues: i32,
    /// Maximum records handled per sweep
    pub batch_size: u64,
}

/// Counts from a single sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub requeued: usize,
    pub failed: usize,
    /// Records that changed between the query and the write
    pub skipped: usize,
    pub errors: usize,
}

/// Start the reconciliation background task.
pub fn start_reconcile_task(
    pipeline: ImagePipeline,
    config: ReconcileConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting reconciliation sweep (interval: {}s, stale after: {}s, max requeues: {})",
            config.interval.as_secs(),
            config.stale_after.as_secs(),
            config.max_requeues
        );

        let mut ticker = interval(config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = run_sweep(&pipeline, &config).await {
                error!("Reconciliation sweep error: {}", e);
            }
        }

        info!("Reconciliation sweep stopped");
    })
}

/// Run a single sweep.
pub async fn run_sweep(pipeline: &ImagePipeline, config: &ReconcileConfig) -> AppResult<SweepReport> {
    let mut report = SweepReport::default();

    let Some(cutoff) = chrono::Duration::from_std(config.stale_after)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age))
    else {
        return Ok(report);
    };

    let stale = pipeline
        .store()
        .find_stale_pending(cutoff, config.batch_size)
        .await?;

    if stale.is_empty() {
        return Ok(report);
    }

    info!("Found {} stale pending images", stale.len());

    for image in stale {
        if image.requeue_count >= config.max_requeues {
            let reason = format!("not processed after {} requeues", image.requeue_count);
            match pipeline
                .store()
                .fail_stale(image.id, image.requeue_count, &reason)
                .await
            {
                Ok(UpdateOutcome::Updated) => {
                    warn!(image_id = %image.id, "Giving up on image: {}", reason);
                    report.failed += 1;
                }
                Ok(UpdateOutcome::Missing) => report.skipped += 1,
                Err(e) => {
                    warn!(image_id = %image.id, op = "fail_stale", "Failed to mark image failed: {}", e);
                    report.errors += 1;
                }
            }
            continue;
        }

        match pipeline.requeue_stale(&image).await {
            Ok(true) => report.requeued += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!(image_id = %image.id, op = "requeue", "Failed to requeue image: {}", e);
                report.errors += 1;
            }
        }
    }

    info!(
        "Reconciliation sweep: {} requeued, {} failed, {} skipped, {} errors",
        report.requeued, report.failed, report.skipped, report.errors
    );

    Ok(report)
}
