//! Workflow SLA tracking and approval performance analytics.
//!
//! Two in-memory components sit behind an axum API: the [`sla::SlaTracker`]
//! (per-step SLA timers with lazily derived status) and the
//! [`analytics::WorkflowAnalytics`] aggregator (per-workflow timing records
//! and cross-workflow metrics).

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

pub mod analytics;
pub mod api;
pub mod clock;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod notification;
pub mod sla;

use analytics::directory::StaticDirectory;
use analytics::WorkflowAnalytics;
use clock::Clock;
use models::sla::BreachAlert;
use sla::SlaTracker;

/// Shared application state passed to handlers and jobs.
pub struct AppState {
    pub sla: SlaTracker,
    pub analytics: Arc<WorkflowAnalytics>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(
        config: config::Config,
        clock: Arc<dyn Clock>,
        alerts: Option<UnboundedSender<BreachAlert>>,
    ) -> Self {
        let mut sla = SlaTracker::new(clock.clone()).with_warning_percent(config.warning_percent);
        if let Some(tx) = alerts {
            sla = sla.with_alerts(tx);
        }

        let directory = Arc::new(StaticDirectory::new(config.approver_names.clone()));
        let analytics = Arc::new(WorkflowAnalytics::new(clock, directory));

        Self {
            sla,
            analytics,
            config,
        }
    }
}
