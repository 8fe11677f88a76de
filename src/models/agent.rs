//! Agent capability and risk-gating models.

use crate::models::role::{PermissionType, ResourceType};
use crate::services::error::AuthorizationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Totally ordered action risk scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// What an agent principal may do against one resource type.
///
/// The two thresholds are independent: `max_risk_level` is the hard
/// ceiling, `requires_approval_above` the point past which a human must
/// review. They are not required to be ordered relative to each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPermission {
    pub agent_id: Uuid,
    pub resource: ResourceType,
    pub allowed_actions: Vec<PermissionType>,
    pub max_risk_level: RiskLevel,
    pub requires_approval_above: RiskLevel,
}

/// Lifecycle of a gated agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Submitted,
    AutoApproved,
    PendingReview,
    Approved,
    Rejected,
    Executed,
    Failed,
}

/// Explicit reviewer verdict for actions parked in `PendingReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Result of the downstream action once it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
}

/// Record of one agent action moving through the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentAction {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub resource: ResourceType,
    pub action: PermissionType,
    pub risk: RiskLevel,
    pub state: ActionState,
    pub denial_reason: Option<AuthorizationError>,
    pub reviewed_by: Option<Uuid>,
    pub review_comment: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl AgentAction {
    pub fn new(
        agent_id: Uuid,
        resource: ResourceType,
        action: PermissionType,
        risk: RiskLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            resource,
            action,
            risk,
            state: ActionState::Submitted,
            denial_reason: None,
            reviewed_by: None,
            review_comment: None,
            submitted_at: Utc::now(),
            decided_at: None,
        }
    }
}
