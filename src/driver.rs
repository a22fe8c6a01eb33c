//! Sync driver: periodic ticks, the overlap gate, and Ctrl-C wiring.
//!
//! The engine assumes at most one concurrent caller per calendar id; the
//! gate here enforces that invariant at the driver level.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use recal_core::{CancelFlag, RunPace};

use crate::Runtime;

/// Cancel the in-flight run when the user interrupts. The run stops at its
/// next checkpoint; mutations already applied stay committed.
pub fn install_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next checkpoint");
            cancel.cancel();
        }
    });
}

/// Run the engine on a fixed interval until cancelled.
pub async fn watch(runtime: &Runtime, every: Duration, json: bool) -> Result<()> {
    let in_progress = Arc::new(AtomicBool::new(false));
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval = ?every, "watching for unprocessed records");

    loop {
        interval.tick().await;
        if runtime.cancel.is_cancelled() {
            break;
        }

        // At most one run per calendar at a time.
        if in_progress.swap(true, Ordering::SeqCst) {
            warn!("previous run still in progress, skipping tick");
            continue;
        }

        match runtime
            .engine
            .run(
                &runtime.calendar_id,
                runtime.calendar_key.as_deref(),
                RunPace::Incremental,
            )
            .await
        {
            Ok(outcome) => {
                if outcome.total() > 0 {
                    crate::render_outcome(&outcome, json);
                }
            }
            Err(err) => warn!(error = %err, "scheduled run failed"),
        }

        in_progress.store(false, Ordering::SeqCst);

        if runtime.cancel.is_cancelled() {
            break;
        }
    }

    info!("watch loop stopped");
    Ok(())
}
