//! Workflow performance aggregator.
//!
//! One [`WorkflowPerformance`] record per workflow instance, updated by
//! completion hooks and summarised on demand. Nothing expires on its own;
//! old records go only through [`WorkflowAnalytics::clear_old_data`].

pub mod directory;
pub mod metrics;

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::clock::{hours_between, Clock};
use crate::models::workflow::{
    MetricsFilter, PerformanceStatus, StepDecision, StepPerformance, StepPlan, WorkflowMetrics,
    WorkflowPerformance,
};
use directory::ApproverDirectory;

pub struct WorkflowAnalytics {
    workflows: DashMap<String, WorkflowPerformance>,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn ApproverDirectory>,
}

impl WorkflowAnalytics {
    pub fn new(clock: Arc<dyn Clock>, directory: Arc<dyn ApproverDirectory>) -> Self {
        Self {
            workflows: DashMap::new(),
            clock,
            directory,
        }
    }

    pub fn track_workflow_start(&self, workflow_id: &str, workflow_type: &str, steps: &[StepPlan]) {
        let now = self.clock.now();
        let record = WorkflowPerformance {
            workflow_id: workflow_id.to_string(),
            workflow_type: workflow_type.to_string(),
            start_time: now,
            end_time: None,
            total_duration_hours: None,
            sla_status: PerformanceStatus::Met,
            steps: steps
                .iter()
                .map(|plan| StepPerformance {
                    step_number: plan.step_number,
                    start_time: now,
                    end_time: None,
                    duration_hours: None,
                    approver_id: plan.approver_id.clone(),
                    decision: None,
                    sla_target_hours: plan.sla_target,
                    sla_status: PerformanceStatus::Met,
                })
                .collect(),
        };

        info!(workflow_id, workflow_type, steps = steps.len(), "analytics: workflow started");
        self.workflows.insert(workflow_id.to_string(), record);
    }

    pub fn track_step_completion(&self, workflow_id: &str, step_number: u32, decision: StepDecision) {
        let Some(mut workflow) = self.workflows.get_mut(workflow_id) else {
            debug!(workflow_id, "analytics: step completion for unknown workflow ignored");
            return;
        };
        let now = self.clock.now();
        let Some(step) = workflow.steps.iter_mut().find(|s| s.step_number == step_number) else {
            debug!(workflow_id, step = step_number, "analytics: unknown step ignored");
            return;
        };
        if step.end_time.is_some() {
            debug!(workflow_id, step = step_number, "analytics: step already completed, ignored");
            return;
        }

        let duration = hours_between(step.start_time, now);
        step.end_time = Some(now);
        step.duration_hours = Some(duration);
        step.decision = Some(decision);

        if duration > step.sla_target_hours {
            step.sla_status = PerformanceStatus::Breached;
            let target = step.sla_target_hours;
            workflow.sla_status = PerformanceStatus::Breached;
            warn!(
                workflow_id,
                step = step_number,
                duration_hours = duration,
                target_hours = target,
                "analytics: step exceeded SLA target"
            );
        }
    }

    pub fn track_workflow_completion(&self, workflow_id: &str) {
        let Some(mut workflow) = self.workflows.get_mut(workflow_id) else {
            debug!(workflow_id, "analytics: completion for unknown workflow ignored");
            return;
        };
        let now = self.clock.now();
        let total = hours_between(workflow.start_time, now);
        workflow.end_time = Some(now);
        workflow.total_duration_hours = Some(total);
        info!(workflow_id, total_hours = total, "analytics: workflow completed");
    }

    pub fn metrics(&self, filter: &MetricsFilter) -> WorkflowMetrics {
        let snapshot: Vec<WorkflowPerformance> = self
            .workflows
            .iter()
            .filter(|w| filter.matches(w.value()))
            .map(|w| w.value().clone())
            .collect();
        metrics::summarize(&snapshot, self.directory.as_ref())
    }

    pub fn workflow_performance(&self, workflow_id: &str) -> Option<WorkflowPerformance> {
        self.workflows.get(workflow_id).map(|w| w.value().clone())
    }

    /// Drop every record that started before `now - days_to_keep days`.
    /// Returns how many were removed. A window reaching past the start of
    /// chrono's date range keeps everything.
    pub fn clear_old_data(&self, days_to_keep: i64) -> usize {
        let Some(cutoff) = Duration::try_days(days_to_keep)
            .and_then(|window| self.clock.now().checked_sub_signed(window))
        else {
            debug!(days_to_keep, "analytics: retention window unbounded, nothing cleared");
            return 0;
        };
        let before = self.workflows.len();
        self.workflows.retain(|_, w| w.start_time >= cutoff);
        let removed = before.saturating_sub(self.workflows.len());
        info!(removed, days_to_keep, cutoff = %cutoff, "analytics: old workflow data cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
