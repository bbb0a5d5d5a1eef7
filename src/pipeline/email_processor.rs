//! Background retry sweeper: re-runs emails left in `RECEIVED`.
//!
//! Timer-based loop:
//! 1. `list_emails(status = RECEIVED)` from the store
//! 2. `pipeline.process_batch()` on everything found
//!
//! Failed runs revert to `RECEIVED` and are picked up again on the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::emails::EmailStatus;
use crate::pipeline::processor::TriagePipeline;
use crate::store::{EmailFilter, Store};

/// Spawn a background task that re-triggers the pipeline for `RECEIVED` emails.
///
/// The first tick fires after one full `interval`, so freshly received emails
/// are left to the intake path. Returns a `JoinHandle` and shutdown flag.
pub fn spawn_retry_sweeper(
    store: Arc<dyn Store>,
    pipeline: Arc<TriagePipeline>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Retry sweeper started");

        let start = tokio::time::Instant::now() + interval;
        let mut tick = tokio::time::interval_at(start, interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Retry sweeper shutting down");
                return;
            }

            sweep_received(&store, &pipeline).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run every `RECEIVED` email through the pipeline once.
///
/// Returns the number of emails that completed triage.
pub async fn sweep_received(store: &Arc<dyn Store>, pipeline: &Arc<TriagePipeline>) -> usize {
    let pending = match store
        .list_emails(&EmailFilter::status(EmailStatus::Received))
        .await
    {
        Ok(emails) => emails,
        Err(e) => {
            error!(error = %e, "Failed to load RECEIVED emails");
            return 0;
        }
    };

    if pending.is_empty() {
        debug!("No emails awaiting triage");
        return 0;
    }

    info!(count = pending.len(), "Re-triggering triage");
    pipeline.process_batch(pending).await.len()
}
