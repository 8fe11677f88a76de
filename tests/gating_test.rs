mod common;

use std::sync::Arc;

use keystone_identity::models::{
    ActionOutcome, ActionState, AgentPermission, PermissionType, Principal, ResourceType,
    ReviewDecision, RiskLevel,
};
use keystone_identity::services::{AgentGate, AuthorizationError, GateError, RbacEngine};
use uuid::Uuid;

/// Gate wired to an agent allowed to deploy Deployments up to High risk,
/// with human review required above Medium.
fn gated_agent() -> (AgentGate, Principal) {
    let rbac = Arc::new(RbacEngine::new());
    let agent = Principal::new_agent("deploy-bot".to_string(), "deploy-bot@agents".to_string());

    let role = rbac.create_role("agent-deployer", None).unwrap();
    let perm = rbac
        .define_permission(
            "deployment:deploy",
            ResourceType::Deployment,
            PermissionType::Deploy,
        )
        .unwrap();
    rbac.grant_permission(role, perm).unwrap();
    rbac.assign_role(agent.id, role, Uuid::new_v4()).unwrap();

    rbac.set_agent_permissions(
        agent.id,
        vec![AgentPermission {
            agent_id: agent.id,
            resource: ResourceType::Deployment,
            allowed_actions: vec![PermissionType::Deploy],
            max_risk_level: RiskLevel::High,
            requires_approval_above: RiskLevel::Medium,
        }],
    )
    .unwrap();

    (AgentGate::new(rbac), agent)
}

fn submit(gate: &AgentGate, agent: &Principal, risk: RiskLevel) -> keystone_identity::models::AgentAction {
    gate.submit(
        agent,
        ResourceType::Deployment,
        PermissionType::Deploy,
        risk,
        None,
    )
    .expect("submit failed")
}

#[test]
fn risk_at_or_below_approval_threshold_auto_approves() {
    let (gate, agent) = gated_agent();

    assert_eq!(submit(&gate, &agent, RiskLevel::Low).state, ActionState::AutoApproved);
    assert_eq!(
        submit(&gate, &agent, RiskLevel::Medium).state,
        ActionState::AutoApproved
    );
}

#[test]
fn risk_above_threshold_but_within_ceiling_parks_for_review() {
    let (gate, agent) = gated_agent();

    let record = submit(&gate, &agent, RiskLevel::High);
    assert_eq!(record.state, ActionState::PendingReview);
    assert!(record.denial_reason.is_none());
    assert!(record.decided_at.is_none());
}

#[test]
fn risk_above_ceiling_rejected_with_reason() {
    let (gate, agent) = gated_agent();

    let record = submit(&gate, &agent, RiskLevel::Critical);
    assert_eq!(record.state, ActionState::Rejected);
    assert_eq!(
        record.denial_reason,
        Some(AuthorizationError::RiskCeilingExceeded)
    );
    assert!(record.decided_at.is_some());
}

#[test]
fn action_outside_allowed_set_rejected() {
    let (gate, agent) = gated_agent();

    let record = gate
        .submit(
            &agent,
            ResourceType::Deployment,
            PermissionType::Delete,
            RiskLevel::Low,
            None,
        )
        .unwrap();
    assert_eq!(record.state, ActionState::Rejected);
    assert_eq!(
        record.denial_reason,
        Some(AuthorizationError::InsufficientPermission)
    );
}

#[test]
fn missing_capability_profile_rejects_even_with_role_grant() {
    let rbac = Arc::new(RbacEngine::new());
    let agent = Principal::new_agent("bot".to_string(), "bot@agents".to_string());

    let role = rbac.create_role("agent", None).unwrap();
    let perm = rbac
        .define_permission("task:update", ResourceType::Task, PermissionType::Update)
        .unwrap();
    rbac.grant_permission(role, perm).unwrap();
    rbac.assign_role(agent.id, role, Uuid::new_v4()).unwrap();

    let gate = AgentGate::new(rbac);
    let record = gate
        .submit(
            &agent,
            ResourceType::Task,
            PermissionType::Update,
            RiskLevel::Low,
            None,
        )
        .unwrap();
    assert_eq!(record.state, ActionState::Rejected);
    assert_eq!(
        record.denial_reason,
        Some(AuthorizationError::InsufficientPermission)
    );
}

#[test]
fn capability_profile_without_role_grant_rejects() {
    let rbac = Arc::new(RbacEngine::new());
    let agent = Principal::new_agent("bot".to_string(), "bot@agents".to_string());

    rbac.set_agent_permissions(
        agent.id,
        vec![AgentPermission {
            agent_id: agent.id,
            resource: ResourceType::Task,
            allowed_actions: vec![PermissionType::Update],
            max_risk_level: RiskLevel::High,
            requires_approval_above: RiskLevel::High,
        }],
    )
    .unwrap();

    let gate = AgentGate::new(rbac);
    let record = gate
        .submit(
            &agent,
            ResourceType::Task,
            PermissionType::Update,
            RiskLevel::Low,
            None,
        )
        .unwrap();
    assert_eq!(record.state, ActionState::Rejected);
    assert_eq!(
        record.denial_reason,
        Some(AuthorizationError::InsufficientPermission)
    );
}

#[test]
fn human_principal_cannot_submit() {
    let (gate, _) = gated_agent();
    let human = Principal::new_mirrored(
        "jdoe".to_string(),
        "jdoe@example.com".to_string(),
        "Jane".to_string(),
        "Doe".to_string(),
        true,
    );

    let err = gate
        .submit(
            &human,
            ResourceType::Deployment,
            PermissionType::Deploy,
            RiskLevel::Low,
            None,
        )
        .unwrap_err();
    assert_eq!(err, GateError::NotAnAgent);
}

#[test]
fn review_resolves_pending_action() {
    let (gate, agent) = gated_agent();
    let pending = submit(&gate, &agent, RiskLevel::High);

    let reviewer = Uuid::new_v4();
    let approved = gate
        .review(
            pending.id,
            reviewer,
            ReviewDecision::Approve,
            Some("deployment window open".to_string()),
        )
        .unwrap();
    assert_eq!(approved.state, ActionState::Approved);
    assert_eq!(approved.reviewed_by, Some(reviewer));
    assert!(approved.decided_at.is_some());
}

#[test]
fn review_rejection_is_recorded() {
    let (gate, agent) = gated_agent();
    let pending = submit(&gate, &agent, RiskLevel::High);

    let rejected = gate
        .review(pending.id, Uuid::new_v4(), ReviewDecision::Reject, None)
        .unwrap();
    assert_eq!(rejected.state, ActionState::Rejected);
}

#[test]
fn review_only_valid_from_pending() {
    let (gate, agent) = gated_agent();
    let auto = submit(&gate, &agent, RiskLevel::Low);

    let err = gate
        .review(auto.id, Uuid::new_v4(), ReviewDecision::Approve, None)
        .unwrap_err();
    assert_eq!(
        err,
        GateError::InvalidTransition {
            from: ActionState::AutoApproved,
            event: "review",
        }
    );
}

#[test]
fn review_of_unknown_action_fails() {
    let (gate, _) = gated_agent();
    assert_eq!(
        gate.review(Uuid::new_v4(), Uuid::new_v4(), ReviewDecision::Approve, None),
        Err(GateError::UnknownAction)
    );
}

#[test]
fn outcome_recorded_from_auto_approved_and_approved() {
    let (gate, agent) = gated_agent();

    let auto = submit(&gate, &agent, RiskLevel::Low);
    let executed = gate.record_outcome(auto.id, ActionOutcome::Succeeded).unwrap();
    assert_eq!(executed.state, ActionState::Executed);

    let pending = submit(&gate, &agent, RiskLevel::High);
    gate.review(pending.id, Uuid::new_v4(), ReviewDecision::Approve, None)
        .unwrap();
    let failed = gate.record_outcome(pending.id, ActionOutcome::Failed).unwrap();
    assert_eq!(failed.state, ActionState::Failed);
}

#[test]
fn failed_action_is_terminal() {
    let (gate, agent) = gated_agent();
    let auto = submit(&gate, &agent, RiskLevel::Low);
    gate.record_outcome(auto.id, ActionOutcome::Failed).unwrap();

    let err = gate
        .record_outcome(auto.id, ActionOutcome::Succeeded)
        .unwrap_err();
    assert_eq!(
        err,
        GateError::InvalidTransition {
            from: ActionState::Failed,
            event: "record_outcome",
        }
    );
}

#[test]
fn rejected_action_cannot_execute() {
    let (gate, agent) = gated_agent();
    let rejected = submit(&gate, &agent, RiskLevel::Critical);

    let err = gate
        .record_outcome(rejected.id, ActionOutcome::Succeeded)
        .unwrap_err();
    assert_eq!(
        err,
        GateError::InvalidTransition {
            from: ActionState::Rejected,
            event: "record_outcome",
        }
    );
}

#[test]
fn gate_keeps_full_decision_history() {
    let (gate, agent) = gated_agent();
    let rejected = submit(&gate, &agent, RiskLevel::Critical);

    let stored = gate.action(rejected.id).expect("record missing");
    assert_eq!(stored.state, ActionState::Rejected);
    assert_eq!(stored.agent_id, agent.id);
}
