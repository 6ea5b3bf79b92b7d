//! Policy set loaded into every new tracker.

use crate::models::sla::{EscalationAction, EscalationRule, SlaDefinition};

fn policy(
    id: &str,
    workflow_type: &str,
    step_number: u32,
    target_hours: f64,
    escalation_rules: Vec<EscalationRule>,
) -> SlaDefinition {
    SlaDefinition {
        id: id.to_string(),
        workflow_type: workflow_type.to_string(),
        step_number,
        target_hours,
        warning_threshold_percent: 80.0,
        escalation_rules,
    }
}

fn notify(trigger_percent: f64, targets: &[&str]) -> EscalationRule {
    EscalationRule {
        trigger_percent,
        action: EscalationAction::Notify,
        notify: targets.iter().map(|t| t.to_string()).collect(),
        escalate_to: None,
    }
}

fn escalate(trigger_percent: f64, to: &str, targets: &[&str]) -> EscalationRule {
    EscalationRule {
        trigger_percent,
        action: EscalationAction::Escalate,
        notify: targets.iter().map(|t| t.to_string()).collect(),
        escalate_to: Some(to.to_string()),
    }
}

pub fn default_policies() -> Vec<SlaDefinition> {
    vec![
        policy(
            "sla-pr-step1",
            "purchase-requisition",
            1,
            24.0,
            vec![
                notify(75.0, &["approver"]),
                escalate(100.0, "department-head", &["approver", "requester"]),
            ],
        ),
        policy(
            "sla-pr-step2",
            "purchase-requisition",
            2,
            48.0,
            vec![
                notify(80.0, &["approver"]),
                escalate(100.0, "procurement-manager", &["approver"]),
            ],
        ),
        policy(
            "sla-po-step1",
            "purchase-order",
            1,
            24.0,
            vec![escalate(100.0, "procurement-manager", &["approver"])],
        ),
        policy(
            "sla-po-step2",
            "purchase-order",
            2,
            72.0,
            vec![
                notify(50.0, &["approver"]),
                escalate(100.0, "finance-director", &["approver", "requester"]),
            ],
        ),
        policy(
            "sla-expense-step1",
            "expense-claim",
            1,
            48.0,
            vec![notify(80.0, &["approver", "employee"])],
        ),
        policy("sla-leave-step1", "leave-request", 1, 24.0, vec![]),
        policy(
            "sla-invoice-step1",
            "invoice-approval",
            1,
            72.0,
            vec![
                notify(75.0, &["approver"]),
                escalate(100.0, "finance-controller", &["approver"]),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_policy_ids_are_unique() {
        let policies = default_policies();
        let ids: HashSet<_> = policies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), policies.len());
    }

    #[test]
    fn test_default_rules_are_ordered_by_trigger() {
        for p in default_policies() {
            let triggers: Vec<f64> = p.escalation_rules.iter().map(|r| r.trigger_percent).collect();
            let mut sorted = triggers.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(triggers, sorted, "rules out of order in {}", p.id);
        }
    }
}
