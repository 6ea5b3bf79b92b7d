use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static SLA policy for one step of one workflow type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaDefinition {
    pub id: String,
    pub workflow_type: String,
    pub step_number: u32,
    pub target_hours: f64,
    pub warning_threshold_percent: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalation_rules: Vec<EscalationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRule {
    /// Percent of the target duration at which this rule fires.
    pub trigger_percent: f64,
    pub action: EscalationAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationAction {
    Notify,
    Escalate,
    Reassign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlaStatus {
    OnTrack,
    Warning,
    Breached,
}

impl SlaStatus {
    /// Classify a percent-of-target-elapsed value.
    pub fn classify(percent_elapsed: f64, warning_threshold_percent: f64) -> Self {
        if percent_elapsed >= 100.0 {
            SlaStatus::Breached
        } else if percent_elapsed >= warning_threshold_percent {
            SlaStatus::Warning
        } else {
            SlaStatus::OnTrack
        }
    }
}

/// Stored timer for one approval step. Holds timestamps only; status is
/// projected on read by the tracker.
#[derive(Debug, Clone)]
pub struct SlaTracking {
    pub approval_id: String,
    pub step_number: u32,
    pub workflow_type: Option<String>,
    pub policy_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub due_time: DateTime<Utc>,
    pub warning_threshold_percent: f64,
    pub breached_at: Option<DateTime<Utc>>,
}

impl SlaTracking {
    pub fn key(&self) -> String {
        tracking_key(&self.approval_id, self.step_number)
    }

    /// Percent of the target window elapsed at `now`. A zero-length window
    /// counts as fully elapsed.
    pub fn percent_elapsed(&self, now: DateTime<Utc>) -> f64 {
        let total_ms = (self.due_time - self.start_time).num_milliseconds();
        if total_ms <= 0 {
            return 100.0;
        }
        let elapsed_ms = (now - self.start_time).num_milliseconds();
        elapsed_ms as f64 * 100.0 / total_ms as f64
    }
}

pub fn tracking_key(approval_id: &str, step_number: u32) -> String {
    format!("{}:{}", approval_id, step_number)
}

/// Point-in-time projection of a tracking record, returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaStatusView {
    pub approval_id: String,
    pub step_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub due_time: DateTime<Utc>,
    pub status: SlaStatus,
    pub percent_elapsed: f64,
    pub remaining_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breached_at: Option<DateTime<Utc>>,
}

/// Emitted once per tracking record, on its first observed breach.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachAlert {
    pub approval_id: String,
    pub step_number: u32,
    pub workflow_type: Option<String>,
    pub due_time: DateTime<Utc>,
    pub breached_at: DateTime<Utc>,
}
