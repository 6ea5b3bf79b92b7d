use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDecision {
    Approved,
    Rejected,
}

/// SLA outcome of a completed step or workflow. Only ever moves from
/// `Met` to `Breached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceStatus {
    Met,
    Breached,
}

/// Step description supplied when a workflow starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPlan {
    pub step_number: u32,
    pub approver_id: String,
    /// SLA target in hours.
    pub sla_target: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPerformance {
    pub step_number: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub approver_id: String,
    pub decision: Option<StepDecision>,
    pub sla_target_hours: f64,
    pub sla_status: PerformanceStatus,
}

impl StepPerformance {
    pub fn is_pending(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPerformance {
    pub workflow_id: String,
    pub workflow_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_hours: Option<f64>,
    pub sla_status: PerformanceStatus,
    pub steps: Vec<StepPerformance>,
}

impl WorkflowPerformance {
    pub fn is_completed(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.decision == Some(StepDecision::Rejected))
    }
}

/// Optional predicates applied before aggregation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFilter {
    #[serde(alias = "workflow_type")]
    pub workflow_type: Option<String>,
    #[serde(alias = "start_date")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(alias = "end_date")]
    pub end_date: Option<DateTime<Utc>>,
}

impl MetricsFilter {
    pub fn matches(&self, workflow: &WorkflowPerformance) -> bool {
        if let Some(ref wanted) = self.workflow_type {
            if &workflow.workflow_type != wanted {
                return false;
            }
        }
        if let Some(from) = self.start_date {
            if workflow.start_time < from {
                return false;
            }
        }
        if let Some(to) = self.end_date {
            if workflow.start_time > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetrics {
    pub total_workflows: usize,
    pub completed_workflows: usize,
    pub pending_workflows: usize,
    pub rejected_workflows: usize,
    pub average_completion_hours: f64,
    pub sla_compliance_rate: f64,
    pub bottlenecks: Vec<Bottleneck>,
    pub approver_performance: Vec<ApproverPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub step_number: u32,
    pub approver_id: String,
    pub average_duration_hours: f64,
    pub backlog_count: usize,
    pub is_bottleneck: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverPerformance {
    pub approver_id: String,
    pub approver_name: String,
    pub total_decisions: usize,
    pub average_response_hours: f64,
    pub approval_rate: f64,
    pub sla_compliance_rate: f64,
}
