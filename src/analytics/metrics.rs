//! Pure aggregation over a snapshot of workflow records.

use std::collections::BTreeMap;

use crate::analytics::directory::ApproverDirectory;
use crate::models::workflow::{
    ApproverPerformance, Bottleneck, PerformanceStatus, StepDecision, StepPerformance,
    WorkflowMetrics, WorkflowPerformance,
};

/// A step group is a bottleneck above this average duration...
pub const BOTTLENECK_AVG_HOURS: f64 = 24.0;
/// ...or with more than this many steps still open.
pub const BOTTLENECK_BACKLOG: usize = 5;

pub fn summarize(workflows: &[WorkflowPerformance], directory: &dyn ApproverDirectory) -> WorkflowMetrics {
    let total = workflows.len();
    let completed: Vec<&WorkflowPerformance> = workflows.iter().filter(|w| w.is_completed()).collect();
    let rejected = workflows.iter().filter(|w| w.is_rejected()).count();
    let met = workflows
        .iter()
        .filter(|w| w.sla_status == PerformanceStatus::Met)
        .count();

    let average_completion_hours = mean(completed.iter().filter_map(|w| w.total_duration_hours));

    WorkflowMetrics {
        total_workflows: total,
        completed_workflows: completed.len(),
        pending_workflows: total - completed.len(),
        rejected_workflows: rejected,
        average_completion_hours,
        sla_compliance_rate: percent(met, total),
        bottlenecks: bottlenecks(workflows),
        approver_performance: approver_performance(workflows, directory),
    }
}

/// Step groups keyed by `(step_number, approver_id)` that exceed either
/// threshold, busiest backlog first.
pub fn bottlenecks(workflows: &[WorkflowPerformance]) -> Vec<Bottleneck> {
    let mut groups: BTreeMap<(u32, &str), Vec<&StepPerformance>> = BTreeMap::new();
    for step in workflows.iter().flat_map(|w| w.steps.iter()) {
        groups
            .entry((step.step_number, step.approver_id.as_str()))
            .or_default()
            .push(step);
    }

    let mut flagged: Vec<Bottleneck> = groups
        .into_iter()
        .map(|((step_number, approver_id), steps)| {
            let average_duration_hours = mean(steps.iter().filter_map(|s| s.duration_hours));
            let backlog_count = steps.iter().filter(|s| s.is_pending()).count();
            Bottleneck {
                step_number,
                approver_id: approver_id.to_string(),
                average_duration_hours,
                backlog_count,
                is_bottleneck: average_duration_hours > BOTTLENECK_AVG_HOURS
                    || backlog_count > BOTTLENECK_BACKLOG,
            }
        })
        .filter(|b| b.is_bottleneck)
        .collect();

    // Stable sort keeps (step, approver) order among equal backlogs.
    flagged.sort_by(|a, b| b.backlog_count.cmp(&a.backlog_count));
    flagged
}

/// Rollup over decided steps, one entry per approver ordered by id.
pub fn approver_performance(
    workflows: &[WorkflowPerformance],
    directory: &dyn ApproverDirectory,
) -> Vec<ApproverPerformance> {
    let mut by_approver: BTreeMap<&str, Vec<&StepPerformance>> = BTreeMap::new();
    for step in workflows
        .iter()
        .flat_map(|w| w.steps.iter())
        .filter(|s| s.decision.is_some())
    {
        by_approver.entry(step.approver_id.as_str()).or_default().push(step);
    }

    by_approver
        .into_iter()
        .map(|(approver_id, steps)| {
            let total = steps.len();
            let approved = steps
                .iter()
                .filter(|s| s.decision == Some(StepDecision::Approved))
                .count();
            let met = steps
                .iter()
                .filter(|s| s.sla_status == PerformanceStatus::Met)
                .count();

            ApproverPerformance {
                approver_id: approver_id.to_string(),
                approver_name: directory
                    .display_name(approver_id)
                    .unwrap_or_else(|| approver_id.to_string()),
                total_decisions: total,
                average_response_hours: mean(steps.iter().filter_map(|s| s.duration_hours)),
                approval_rate: percent(approved, total),
                sla_compliance_rate: percent(met, total),
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::directory::StaticDirectory;
    use chrono::{Duration, Utc};

    fn step(number: u32, approver: &str, duration: Option<f64>, decision: Option<StepDecision>) -> StepPerformance {
        let start = Utc::now();
        StepPerformance {
            step_number: number,
            start_time: start,
            end_time: duration.map(|_| start + Duration::hours(1)),
            duration_hours: duration,
            approver_id: approver.to_string(),
            decision,
            sla_target_hours: 24.0,
            sla_status: match duration {
                Some(d) if d > 24.0 => PerformanceStatus::Breached,
                _ => PerformanceStatus::Met,
            },
        }
    }

    fn workflow(id: &str, steps: Vec<StepPerformance>) -> WorkflowPerformance {
        let breached = steps.iter().any(|s| s.sla_status == PerformanceStatus::Breached);
        WorkflowPerformance {
            workflow_id: id.to_string(),
            workflow_type: "purchase-order".to_string(),
            start_time: Utc::now(),
            end_time: None,
            total_duration_hours: None,
            sla_status: if breached { PerformanceStatus::Breached } else { PerformanceStatus::Met },
            steps,
        }
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let m = summarize(&[], &StaticDirectory::default());
        assert_eq!(m.total_workflows, 0);
        assert_eq!(m.completed_workflows, 0);
        assert_eq!(m.pending_workflows, 0);
        assert_eq!(m.rejected_workflows, 0);
        assert_eq!(m.average_completion_hours, 0.0);
        assert_eq!(m.sla_compliance_rate, 0.0);
        assert!(m.bottlenecks.is_empty());
        assert!(m.approver_performance.is_empty());
    }

    #[test]
    fn test_slow_group_is_bottleneck() {
        let wfs = vec![
            workflow("W1", vec![step(1, "A1", Some(30.0), Some(StepDecision::Approved))]),
            workflow("W2", vec![step(1, "A1", Some(20.0), Some(StepDecision::Approved))]),
            workflow("W3", vec![step(1, "A2", Some(2.0), Some(StepDecision::Approved))]),
        ];
        let b = bottlenecks(&wfs);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].approver_id, "A1");
        assert!((b[0].average_duration_hours - 25.0).abs() < 1e-9);
        assert_eq!(b[0].backlog_count, 0);
    }

    #[test]
    fn test_exactly_24h_average_is_not_bottleneck() {
        let wfs = vec![workflow("W1", vec![step(1, "A1", Some(24.0), None)])];
        assert!(bottlenecks(&wfs).is_empty());
    }

    #[test]
    fn test_backlog_threshold_and_ordering() {
        let mut wfs = Vec::new();
        for i in 0..6 {
            wfs.push(workflow(&format!("P{}", i), vec![step(2, "A2", None, None)]));
        }
        for i in 0..5 {
            wfs.push(workflow(&format!("Q{}", i), vec![step(1, "A1", None, None)]));
        }
        for i in 0..7 {
            wfs.push(workflow(&format!("R{}", i), vec![step(3, "A3", None, None)]));
        }

        let b = bottlenecks(&wfs);
        // A1 has a backlog of exactly 5 and is not flagged.
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].approver_id, "A3");
        assert_eq!(b[0].backlog_count, 7);
        assert_eq!(b[1].approver_id, "A2");
        assert_eq!(b[1].average_duration_hours, 0.0);
    }

    #[test]
    fn test_approver_rollup_counts_only_decided_steps() {
        let wfs = vec![
            workflow(
                "W1",
                vec![
                    step(1, "A1", Some(10.0), Some(StepDecision::Approved)),
                    step(2, "A2", None, None),
                ],
            ),
            workflow("W2", vec![step(1, "A1", Some(30.0), Some(StepDecision::Rejected))]),
            workflow("W3", vec![step(1, "A1", Some(2.0), Some(StepDecision::Approved))]),
            workflow("W4", vec![step(1, "A1", Some(6.0), Some(StepDecision::Approved))]),
        ];
        let dir = StaticDirectory::new([("A1".to_string(), "Priya Shah".to_string())].into());
        let perf = approver_performance(&wfs, &dir);

        assert_eq!(perf.len(), 1);
        let a1 = &perf[0];
        assert_eq!(a1.approver_name, "Priya Shah");
        assert_eq!(a1.total_decisions, 4);
        assert!((a1.average_response_hours - 12.0).abs() < 1e-9);
        assert!((a1.approval_rate - 75.0).abs() < 1e-9);
        assert!((a1.sla_compliance_rate - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_approver_falls_back_to_id() {
        let wfs = vec![workflow("W1", vec![step(1, "A9", Some(1.0), Some(StepDecision::Approved))])];
        let perf = approver_performance(&wfs, &StaticDirectory::default());
        assert_eq!(perf[0].approver_name, "A9");
    }

    #[test]
    fn test_rejected_counts_independent_of_completion() {
        let mut done = workflow("W1", vec![step(1, "A1", Some(1.0), Some(StepDecision::Approved))]);
        done.end_time = Some(Utc::now());
        done.total_duration_hours = Some(4.0);
        let rejected_open = workflow("W2", vec![step(1, "A1", Some(1.0), Some(StepDecision::Rejected))]);
        let breached = workflow("W3", vec![step(1, "A2", Some(40.0), Some(StepDecision::Approved))]);

        let m = summarize(&[done, rejected_open, breached], &StaticDirectory::default());
        assert_eq!(m.total_workflows, 3);
        assert_eq!(m.completed_workflows, 1);
        assert_eq!(m.pending_workflows, 2);
        assert_eq!(m.rejected_workflows, 1);
        assert_eq!(m.average_completion_hours, 4.0);
        assert!((m.sla_compliance_rate - 200.0 / 3.0).abs() < 1e-9);
    }
}
