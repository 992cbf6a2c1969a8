use std::time::Duration;

use sprite_ledger::ActivityTracker;
use sprite_types::activity::RESET_HORIZON_SECS;
use tracing::{debug, warn};

/// Background task that drops activity rows past the reset horizon.
///
/// Eligibility queries prune on their own; this keeps servers that never
/// rain from accumulating stale rows.
pub async fn run_prune_loop(activity: ActivityTracker, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match activity.prune(RESET_HORIZON_SECS).await {
            Ok(0) => {}
            Ok(count) => debug!("pruned {} stale activity rows", count),
            Err(e) => warn!("activity prune failed: {}", e),
        }
    }
}
