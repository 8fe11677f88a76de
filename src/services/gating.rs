//! Risk gate for agent-initiated actions.
//!
//! Every agent action passes through an explicit state machine. Denials
//! are recorded as `Rejected` actions with a denial reason rather than
//! dropped, so the full decision history stays queryable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ActionOutcome, ActionState, AgentAction, PermissionType, Principal, PrincipalKind,
    ResourceType, ReviewDecision, RiskLevel,
};
use crate::services::error::AuthorizationError;
use crate::services::rbac::RbacEngine;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("unknown action")]
    UnknownAction,

    #[error("invalid transition: {event} from {from:?}")]
    InvalidTransition { from: ActionState, event: &'static str },

    #[error("principal is not an agent")]
    NotAnAgent,

    #[error("gate state lock poisoned")]
    Poisoned,
}

pub struct AgentGate {
    rbac: Arc<RbacEngine>,
    actions: RwLock<HashMap<Uuid, AgentAction>>,
}

impl AgentGate {
    pub fn new(rbac: Arc<RbacEngine>) -> Self {
        Self {
            rbac,
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Submit an action for gating. The decision is made synchronously:
    /// the returned record is already `AutoApproved`, `PendingReview`,
    /// or `Rejected` with its denial reason filled in.
    pub fn submit(
        &self,
        agent: &Principal,
        resource: ResourceType,
        action: PermissionType,
        risk: RiskLevel,
        scope: Option<Uuid>,
    ) -> Result<AgentAction, GateError> {
        if agent.kind != PrincipalKind::Agent {
            return Err(GateError::NotAnAgent);
        }

        let mut record = AgentAction::new(agent.id, resource, action, risk);

        match self.rbac.agent_permission(agent.id, resource) {
            Some(profile)
                if profile.allowed_actions.contains(&action)
                    && self.rbac.has_permission(agent.id, resource, action, scope) =>
            {
                if risk > profile.max_risk_level {
                    record.state = ActionState::Rejected;
                    record.denial_reason = Some(AuthorizationError::RiskCeilingExceeded);
                    record.decided_at = Some(Utc::now());
                } else if risk <= profile.requires_approval_above {
                    record.state = ActionState::AutoApproved;
                    record.decided_at = Some(Utc::now());
                } else {
                    record.state = ActionState::PendingReview;
                }
            }
            _ => {
                record.state = ActionState::Rejected;
                record.denial_reason = Some(AuthorizationError::InsufficientPermission);
                record.decided_at = Some(Utc::now());
            }
        }

        tracing::info!(
            action_id = %record.id,
            agent_id = %agent.id,
            risk = ?risk,
            state = ?record.state,
            "Gated agent action"
        );

        let mut actions = self.actions.write().map_err(|_| GateError::Poisoned)?;
        actions.insert(record.id, record.clone());
        Ok(record)
    }

    /// Apply a reviewer verdict to a pending action.
    pub fn review(
        &self,
        action_id: Uuid,
        reviewer: Uuid,
        decision: ReviewDecision,
        comment: Option<String>,
    ) -> Result<AgentAction, GateError> {
        let mut actions = self.actions.write().map_err(|_| GateError::Poisoned)?;
        let record = actions.get_mut(&action_id).ok_or(GateError::UnknownAction)?;

        if record.state != ActionState::PendingReview {
            return Err(GateError::InvalidTransition {
                from: record.state,
                event: "review",
            });
        }

        record.state = match decision {
            ReviewDecision::Approve => ActionState::Approved,
            ReviewDecision::Reject => ActionState::Rejected,
        };
        record.reviewed_by = Some(reviewer);
        record.review_comment = comment;
        record.decided_at = Some(Utc::now());

        tracing::info!(action_id = %action_id, reviewer = %reviewer, state = ?record.state, "Reviewed agent action");
        Ok(record.clone())
    }

    /// Record the outcome of an approved action's execution. `Failed` is
    /// terminal; a failed action cannot be re-run under the same id.
    pub fn record_outcome(
        &self,
        action_id: Uuid,
        outcome: ActionOutcome,
    ) -> Result<AgentAction, GateError> {
        let mut actions = self.actions.write().map_err(|_| GateError::Poisoned)?;
        let record = actions.get_mut(&action_id).ok_or(GateError::UnknownAction)?;

        if !matches!(
            record.state,
            ActionState::Approved | ActionState::AutoApproved
        ) {
            return Err(GateError::InvalidTransition {
                from: record.state,
                event: "record_outcome",
            });
        }

        record.state = match outcome {
            ActionOutcome::Succeeded => ActionState::Executed,
            ActionOutcome::Failed => ActionState::Failed,
        };
        Ok(record.clone())
    }

    pub fn action(&self, action_id: Uuid) -> Option<AgentAction> {
        self.actions.read().ok()?.get(&action_id).cloned()
    }
}
