pub mod agent;
pub mod principal;
pub mod role;

pub use agent::{
    ActionOutcome, ActionState, AgentAction, AgentPermission, ReviewDecision, RiskLevel,
};
pub use principal::{Principal, PrincipalKind, RegisterRequest, TokenResponse};
pub use role::{
    Permission, PermissionId, PermissionType, ProjectScopedPermission, ResourceType, Role, RoleId,
    UserRoleAssignment,
};
