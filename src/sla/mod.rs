//! SLA tracker: policy definitions plus one timer per approval step.
//!
//! Status is never cached. Each read projects the stored timestamps against
//! the clock; the only write a read performs is stamping `breached_at` the
//! first time a breach is observed. That transition is logged and, when an
//! alert channel is attached, forwarded for webhook delivery.

pub mod defaults;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::clock::{add_hours, hours_between, Clock};
use crate::models::sla::{
    tracking_key, BreachAlert, EscalationRule, SlaDefinition, SlaStatus, SlaStatusView,
    SlaTracking,
};

pub const DEFAULT_WARNING_PERCENT: f64 = 80.0;

/// Upper bound on an SLA window accepted over the API (about 114 years).
pub const MAX_SLA_HOURS: f64 = 1_000_000.0;

pub struct SlaTracker {
    policies: DashMap<String, SlaDefinition>,
    records: DashMap<String, SlaTracking>,
    clock: Arc<dyn Clock>,
    warning_percent: f64,
    alerts: Option<UnboundedSender<BreachAlert>>,
}

impl SlaTracker {
    /// New tracker preloaded with [`defaults::default_policies`].
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let tracker = Self {
            policies: DashMap::new(),
            records: DashMap::new(),
            clock,
            warning_percent: DEFAULT_WARNING_PERCENT,
            alerts: None,
        };
        for policy in defaults::default_policies() {
            tracker.define_policy(policy);
        }
        tracker
    }

    /// Warning threshold for timers started without a policy.
    pub fn with_warning_percent(mut self, percent: f64) -> Self {
        self.warning_percent = percent;
        self
    }

    pub fn with_alerts(mut self, alerts: UnboundedSender<BreachAlert>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    // ── Policies ──────────────────────────────────────────────

    pub fn define_policy(&self, definition: SlaDefinition) {
        debug!(
            policy_id = %definition.id,
            workflow_type = %definition.workflow_type,
            step = definition.step_number,
            "sla: policy defined"
        );
        self.policies.insert(definition.id.clone(), definition);
    }

    pub fn policy(&self, id: &str) -> Option<SlaDefinition> {
        self.policies.get(id).map(|p| p.value().clone())
    }

    /// All policies, ordered by id.
    pub fn policies(&self) -> Vec<SlaDefinition> {
        let mut all: Vec<SlaDefinition> = self.policies.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    // ── Timers ────────────────────────────────────────────────

    /// Start (or restart) the timer for `approval_id:step_number`.
    /// `None` if the due time cannot be represented.
    pub fn start_tracking(
        &self,
        approval_id: &str,
        step_number: u32,
        sla_hours: f64,
    ) -> Option<SlaStatusView> {
        let now = self.clock.now();
        let due_time = add_hours(now, sla_hours)?;
        let record = SlaTracking {
            approval_id: approval_id.to_string(),
            step_number,
            workflow_type: None,
            policy_id: None,
            start_time: now,
            due_time,
            warning_threshold_percent: self.warning_percent,
            breached_at: None,
        };
        Some(self.insert(record, now))
    }

    /// Start a timer whose target, warning threshold and workflow type come
    /// from a registered policy. `None` if the policy is unknown or its
    /// target cannot be represented.
    pub fn start_tracking_for_policy(&self, approval_id: &str, policy_id: &str) -> Option<SlaStatusView> {
        let policy = self.policy(policy_id)?;
        let now = self.clock.now();
        let due_time = add_hours(now, policy.target_hours)?;
        let record = SlaTracking {
            approval_id: approval_id.to_string(),
            step_number: policy.step_number,
            workflow_type: Some(policy.workflow_type),
            policy_id: Some(policy.id),
            start_time: now,
            due_time,
            warning_threshold_percent: policy.warning_threshold_percent,
            breached_at: None,
        };
        Some(self.insert(record, now))
    }

    fn insert(&self, record: SlaTracking, now: DateTime<Utc>) -> SlaStatusView {
        info!(
            approval_id = %record.approval_id,
            step = record.step_number,
            due = %record.due_time,
            "sla: tracking started"
        );
        let view = project(&record, now);
        self.records.insert(record.key(), record);
        view
    }

    pub fn status(&self, approval_id: &str, step_number: u32) -> Option<SlaStatusView> {
        let key = tracking_key(approval_id, step_number);
        let mut record = self.records.get_mut(&key)?;
        let now = self.clock.now();
        let mut view = project(&record, now);

        if view.status == SlaStatus::Breached && record.breached_at.is_none() {
            record.breached_at = Some(now);
            view.breached_at = Some(now);
            warn!(
                approval_id = %record.approval_id,
                step = record.step_number,
                due = %record.due_time,
                "sla: breached"
            );
            self.emit(BreachAlert {
                approval_id: record.approval_id.clone(),
                step_number: record.step_number,
                workflow_type: record.workflow_type.clone(),
                due_time: record.due_time,
                breached_at: now,
            });
        }

        Some(view)
    }

    pub fn stop_tracking(&self, approval_id: &str, step_number: u32) {
        if self.records.remove(&tracking_key(approval_id, step_number)).is_some() {
            info!(approval_id, step = step_number, "sla: tracking stopped");
        }
    }

    /// Fresh status of every timer, ordered by start time then key.
    pub fn active(&self) -> Vec<SlaStatusView> {
        // Collect keys first: `status` takes a write guard on the shard.
        let keys: Vec<(String, u32)> = self
            .records
            .iter()
            .map(|r| (r.approval_id.clone(), r.step_number))
            .collect();

        let mut views: Vec<SlaStatusView> = keys
            .iter()
            .filter_map(|(approval_id, step)| self.status(approval_id, *step))
            .collect();
        views.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.approval_id.cmp(&b.approval_id))
                .then_with(|| a.step_number.cmp(&b.step_number))
        });
        views
    }

    pub fn breached(&self) -> Vec<SlaStatusView> {
        self.active()
            .into_iter()
            .filter(|v| v.status == SlaStatus::Breached)
            .collect()
    }

    pub fn warnings(&self) -> Vec<SlaStatusView> {
        self.active()
            .into_iter()
            .filter(|v| v.status == SlaStatus::Warning)
            .collect()
    }

    /// Escalation rules already triggered for a timer.
    pub fn check_escalation(&self, approval_id: &str, step_number: u32) -> Vec<EscalationRule> {
        let Some(view) = self.status(approval_id, step_number) else {
            return Vec::new();
        };
        let Some(policy) = self.escalation_policy(&view) else {
            return Vec::new();
        };

        policy
            .escalation_rules
            .into_iter()
            .filter(|rule| view.percent_elapsed >= rule.trigger_percent)
            .collect()
    }

    /// The policy that started the timer, else the lowest-id policy for the
    /// same step (and workflow type, when known).
    fn escalation_policy(&self, view: &SlaStatusView) -> Option<SlaDefinition> {
        if let Some(policy) = view.policy_id.as_deref().and_then(|id| self.policy(id)) {
            return Some(policy);
        }

        self.policies()
            .into_iter()
            .filter(|p| p.step_number == view.step_number)
            .find(|p| {
                view.workflow_type
                    .as_ref()
                    .map_or(true, |wt| &p.workflow_type == wt)
            })
    }

    fn emit(&self, alert: BreachAlert) {
        if let Some(ref tx) = self.alerts {
            if tx.send(alert).is_err() {
                debug!("sla: alert channel closed, dropping breach alert");
            }
        }
    }
}

fn project(record: &SlaTracking, now: DateTime<Utc>) -> SlaStatusView {
    let percent_elapsed = record.percent_elapsed(now);
    SlaStatusView {
        approval_id: record.approval_id.clone(),
        step_number: record.step_number,
        workflow_type: record.workflow_type.clone(),
        policy_id: record.policy_id.clone(),
        start_time: record.start_time,
        due_time: record.due_time,
        status: SlaStatus::classify(percent_elapsed, record.warning_threshold_percent),
        percent_elapsed,
        remaining_hours: hours_between(now, record.due_time).max(0.0),
        breached_at: record.breached_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::sla::EscalationAction;
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn tracker() -> (SlaTracker, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        (SlaTracker::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_new_tracker_loads_default_policies() {
        let (sla, _) = tracker();
        assert_eq!(sla.policies().len(), defaults::default_policies().len());
        assert!(sla.policy("sla-pr-step1").is_some());
    }

    #[test]
    fn test_define_policy_overwrites_same_id() {
        let (sla, _) = tracker();
        let mut p = sla.policy("sla-pr-step1").unwrap();
        p.target_hours = 6.0;
        sla.define_policy(p);
        assert_eq!(sla.policy("sla-pr-step1").unwrap().target_hours, 6.0);
        assert_eq!(sla.policies().len(), defaults::default_policies().len());
    }

    #[test]
    fn test_restart_overwrites_previous_timer() {
        let (sla, clock) = tracker();
        sla.start_tracking("APR-1", 1, 1.0);
        clock.advance_hours(2.0);
        assert_eq!(sla.status("APR-1", 1).unwrap().status, SlaStatus::Breached);

        sla.start_tracking("APR-1", 1, 10.0);
        let view = sla.status("APR-1", 1).unwrap();
        assert_eq!(view.status, SlaStatus::OnTrack);
        assert!(view.breached_at.is_none());
        assert_eq!(sla.active().len(), 1);
    }

    #[test]
    fn test_unrepresentable_window_starts_nothing() {
        let (sla, _) = tracker();
        assert!(sla.start_tracking("APR-1", 1, 1e300).is_none());
        assert!(sla.status("APR-1", 1).is_none());

        let mut p = sla.policy("sla-pr-step1").unwrap();
        p.id = "sla-forever".into();
        p.target_hours = 1e12;
        sla.define_policy(p);
        assert!(sla.start_tracking_for_policy("APR-2", "sla-forever").is_none());
        assert!(sla.active().is_empty());
    }

    #[test]
    fn test_policy_threshold_is_honoured() {
        let (sla, clock) = tracker();
        let mut p = sla.policy("sla-leave-step1").unwrap();
        p.warning_threshold_percent = 50.0;
        sla.define_policy(p);

        sla.start_tracking_for_policy("LV-7", "sla-leave-step1").unwrap();
        clock.advance_hours(12.0);
        assert_eq!(sla.status("LV-7", 1).unwrap().status, SlaStatus::Warning);
    }

    #[test]
    fn test_unknown_policy_starts_nothing() {
        let (sla, _) = tracker();
        assert!(sla.start_tracking_for_policy("APR-1", "missing").is_none());
        assert!(sla.active().is_empty());
    }

    #[test]
    fn test_custom_default_warning_percent() {
        let clock = ManualClock::new(Utc::now());
        let sla = SlaTracker::new(Arc::new(clock.clone())).with_warning_percent(90.0);
        sla.start_tracking("APR-1", 1, 10.0);
        clock.advance_hours(8.5);
        assert_eq!(sla.status("APR-1", 1).unwrap().status, SlaStatus::OnTrack);
        clock.advance_hours(0.5);
        assert_eq!(sla.status("APR-1", 1).unwrap().status, SlaStatus::Warning);
    }

    #[test]
    fn test_breach_alert_emitted_once() {
        let clock = ManualClock::new(Utc::now());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sla = SlaTracker::new(Arc::new(clock.clone())).with_alerts(tx);

        sla.start_tracking("APR-9", 2, 4.0);
        clock.advance_hours(5.0);
        sla.status("APR-9", 2);
        clock.advance_hours(1.0);
        sla.status("APR-9", 2);
        sla.active();

        let alert = rx.try_recv().expect("one alert");
        assert_eq!(alert.approval_id, "APR-9");
        assert_eq!(alert.step_number, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_alert_channel_is_ignored() {
        let clock = ManualClock::new(Utc::now());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sla = SlaTracker::new(Arc::new(clock.clone())).with_alerts(tx);
        sla.start_tracking("APR-1", 1, 1.0);
        clock.advance(Duration::hours(2));
        assert_eq!(sla.status("APR-1", 1).unwrap().status, SlaStatus::Breached);
    }

    #[test]
    fn test_escalation_uses_starting_policy() {
        let (sla, clock) = tracker();
        sla.start_tracking_for_policy("PO-1", "sla-po-step2").unwrap();

        clock.advance_hours(36.0);
        let rules = sla.check_escalation("PO-1", 2);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, EscalationAction::Notify);

        clock.advance_hours(36.0);
        let rules = sla.check_escalation("PO-1", 2);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].escalate_to.as_deref(), Some("finance-director"));
    }

    #[test]
    fn test_escalation_falls_back_to_step_number() {
        let (sla, clock) = tracker();
        sla.start_tracking("APR-1", 1, 24.0);
        clock.advance_hours(24.0);

        // Lowest id among step-1 policies is "sla-expense-step1".
        let rules = sla.check_escalation("APR-1", 1);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].notify, vec!["approver".to_string(), "employee".to_string()]);
    }

    #[test]
    fn test_escalation_without_record_or_policy_is_empty() {
        let (sla, _) = tracker();
        assert!(sla.check_escalation("nope", 1).is_empty());

        sla.start_tracking("APR-1", 9, 1.0);
        assert!(sla.check_escalation("APR-1", 9).is_empty());
    }
}
