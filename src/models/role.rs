//! Role and permission models for the RBAC engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resource categories permissions attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Project,
    Requirement,
    Task,
    Agent,
    Deployment,
    Integration,
    User,
    AuditLog,
    SystemSetting,
}

/// Verbs a permission can grant on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Deploy,
    Admin,
}

/// Opaque handle into the role arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

/// A role in the single-parent hierarchy.
///
/// The parent chain is validated acyclic at every parent assignment.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub parent: Option<RoleId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Opaque handle for a registered permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionId(pub Uuid);

impl PermissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named (resource, verb) permission.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub resource: ResourceType,
    pub action: PermissionType,
}

/// Principal-to-role assignment, recording who assigned it and when.
#[derive(Debug, Clone, Serialize)]
pub struct UserRoleAssignment {
    pub principal_id: Uuid,
    pub role_id: RoleId,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
}

/// A role grant scoped to a single project, optionally time-bounded.
///
/// Expired grants are ignored by the engine, not deleted.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectScopedPermission {
    pub principal_id: Uuid,
    pub project_id: Uuid,
    pub role_id: RoleId,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProjectScopedPermission {
    pub fn new(
        principal_id: Uuid,
        project_id: Uuid,
        role_id: RoleId,
        granted_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            principal_id,
            project_id,
            role_id,
            granted_by,
            granted_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }
}
