//! Background job: purge workflow performance records past retention.
//!
//! Opt-in. Without `WFA_CLEANUP_INTERVAL_SECS` records are only purged
//! through `POST /workflow-analytics/cleanup`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::analytics::WorkflowAnalytics;

/// Spawn the periodic retention sweep. Call this once at startup.
pub fn spawn(analytics: Arc<WorkflowAnalytics>, retention_days: i64, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            let removed = analytics.clear_old_data(retention_days);
            if removed > 0 {
                tracing::info!(removed, retention_days, "cleanup job purged workflow records");
            }
        }
    })
}
