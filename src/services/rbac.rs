//! In-memory RBAC engine: role hierarchy, permission grants, principal
//! assignments, and project-scoped grants.
//!
//! Effective permissions are the union over the role's full parent
//! chain. Inactive roles break the chain at their link; roles above and
//! below them still contribute through other assignments. All state
//! sits behind one `RwLock` so permission checks share read access and
//! every write publishes a consistent snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AgentPermission, Permission, PermissionId, PermissionType, ProjectScopedPermission,
    ResourceType, Role, RoleId, UserRoleAssignment,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RbacError {
    #[error("role name already in use: {0}")]
    DuplicateRoleName(String),

    #[error("permission name already in use: {0}")]
    DuplicatePermissionName(String),

    #[error("unknown role")]
    UnknownRole,

    #[error("unknown permission")]
    UnknownPermission,

    #[error("parent assignment would create a cycle")]
    CycleDetected,

    #[error("rbac state lock poisoned")]
    Poisoned,
}

#[derive(Default)]
struct RbacState {
    roles: HashMap<RoleId, Role>,
    roles_by_name: HashMap<String, RoleId>,
    permissions: HashMap<PermissionId, Permission>,
    permission_names: HashSet<String>,
    role_grants: HashMap<RoleId, HashSet<PermissionId>>,
    assignments: HashMap<Uuid, Vec<UserRoleAssignment>>,
    scoped: Vec<ProjectScopedPermission>,
    agent_permissions: HashMap<Uuid, Vec<AgentPermission>>,
}

impl RbacState {
    /// Walk the parent chain from `start`, collecting every role id
    /// passed through. Inactive roles terminate the walk.
    fn role_chain(&self, start: RoleId) -> Vec<RoleId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            if !seen.insert(id) {
                break;
            }
            match self.roles.get(&id) {
                Some(role) if role.is_active => {
                    chain.push(id);
                    cursor = role.parent;
                }
                _ => break,
            }
        }
        chain
    }

    fn chain_grants(&self, start: RoleId, resource: ResourceType, action: PermissionType) -> bool {
        self.role_chain(start).iter().any(|role_id| {
            self.role_grants
                .get(role_id)
                .map(|granted| {
                    granted.iter().any(|pid| {
                        self.permissions
                            .get(pid)
                            .map(|p| p.resource == resource && p.action == action)
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false)
        })
    }
}

#[derive(Default)]
pub struct RbacEngine {
    inner: RwLock<RbacState>,
}

impl RbacEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_role(&self, name: &str, parent: Option<RoleId>) -> Result<RoleId, RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if state.roles_by_name.contains_key(name) {
            return Err(RbacError::DuplicateRoleName(name.to_string()));
        }
        if let Some(parent_id) = parent {
            if !state.roles.contains_key(&parent_id) {
                return Err(RbacError::UnknownRole);
            }
        }

        let role = Role {
            id: RoleId::new(),
            name: name.to_string(),
            parent,
            is_active: true,
            created_at: Utc::now(),
        };
        let id = role.id;
        state.roles_by_name.insert(role.name.clone(), id);
        state.roles.insert(id, role);
        tracing::info!(role = name, "Created role");
        Ok(id)
    }

    /// Re-parent a role. The new chain is walked before committing; a
    /// walk that returns to `role_id` is refused.
    pub fn set_parent(&self, role_id: RoleId, parent: Option<RoleId>) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::UnknownRole);
        }
        if let Some(parent_id) = parent {
            if !state.roles.contains_key(&parent_id) {
                return Err(RbacError::UnknownRole);
            }

            let mut seen = HashSet::new();
            let mut cursor = Some(parent_id);
            while let Some(id) = cursor {
                if id == role_id {
                    return Err(RbacError::CycleDetected);
                }
                if !seen.insert(id) {
                    break;
                }
                cursor = state.roles.get(&id).and_then(|r| r.parent);
            }
        }

        if let Some(role) = state.roles.get_mut(&role_id) {
            role.parent = parent;
        }
        Ok(())
    }

    pub fn set_role_active(&self, role_id: RoleId, is_active: bool) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;
        let role = state.roles.get_mut(&role_id).ok_or(RbacError::UnknownRole)?;
        role.is_active = is_active;
        Ok(())
    }

    pub fn define_permission(
        &self,
        name: &str,
        resource: ResourceType,
        action: PermissionType,
    ) -> Result<PermissionId, RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if !state.permission_names.insert(name.to_string()) {
            return Err(RbacError::DuplicatePermissionName(name.to_string()));
        }

        let permission = Permission {
            id: PermissionId::new(),
            name: name.to_string(),
            resource,
            action,
        };
        let id = permission.id;
        state.permissions.insert(id, permission);
        Ok(id)
    }

    /// Attach a permission to a role. Granting twice is a no-op.
    pub fn grant_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::UnknownRole);
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(RbacError::UnknownPermission);
        }

        state
            .role_grants
            .entry(role_id)
            .or_default()
            .insert(permission_id);
        Ok(())
    }

    /// Assign a role globally to a principal. Re-assignment is a no-op
    /// preserving the original audit record.
    pub fn assign_role(
        &self,
        principal_id: Uuid,
        role_id: RoleId,
        assigned_by: Uuid,
    ) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::UnknownRole);
        }

        let assignments = state.assignments.entry(principal_id).or_default();
        if assignments.iter().any(|a| a.role_id == role_id) {
            return Ok(());
        }
        assignments.push(UserRoleAssignment {
            principal_id,
            role_id,
            assigned_by,
            assigned_at: Utc::now(),
        });
        tracing::info!(user_id = %principal_id, assigned_by = %assigned_by, "Assigned role");
        Ok(())
    }

    /// Grant a role within a single project, optionally time-bounded.
    pub fn grant_scoped(
        &self,
        principal_id: Uuid,
        project_id: Uuid,
        role_id: RoleId,
        granted_by: Uuid,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;

        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::UnknownRole);
        }

        state.scoped.push(ProjectScopedPermission::new(
            principal_id,
            project_id,
            role_id,
            granted_by,
            expires_at,
        ));
        Ok(())
    }

    /// Replace an agent's per-resource permission profiles.
    pub fn set_agent_permissions(
        &self,
        agent_id: Uuid,
        permissions: Vec<AgentPermission>,
    ) -> Result<(), RbacError> {
        let mut state = self.inner.write().map_err(|_| RbacError::Poisoned)?;
        state.agent_permissions.insert(agent_id, permissions);
        Ok(())
    }

    pub fn agent_permission(
        &self,
        agent_id: Uuid,
        resource: ResourceType,
    ) -> Option<AgentPermission> {
        let state = self.inner.read().ok()?;
        state
            .agent_permissions
            .get(&agent_id)?
            .iter()
            .find(|p| p.resource == resource)
            .cloned()
    }

    /// Effective permission check. Global role assignments apply in any
    /// scope; project-scoped grants apply only when `scope` matches
    /// their project and the grant has not expired.
    pub fn has_permission(
        &self,
        principal_id: Uuid,
        resource: ResourceType,
        action: PermissionType,
        scope: Option<Uuid>,
    ) -> bool {
        let state = match self.inner.read() {
            Ok(state) => state,
            Err(_) => return false,
        };
        let now = Utc::now();

        if let Some(assignments) = state.assignments.get(&principal_id) {
            if assignments
                .iter()
                .any(|a| state.chain_grants(a.role_id, resource, action))
            {
                return true;
            }
        }

        if let Some(project_id) = scope {
            return state.scoped.iter().any(|grant| {
                grant.principal_id == principal_id
                    && grant.project_id == project_id
                    && !grant.is_expired(now)
                    && state.chain_grants(grant.role_id, resource, action)
            });
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_role(name: &str) -> (RbacEngine, RoleId) {
        let engine = RbacEngine::new();
        let role = engine.create_role(name, None).unwrap();
        (engine, role)
    }

    #[test]
    fn test_duplicate_role_name_rejected() {
        let (engine, _) = engine_with_role("developer");
        assert_eq!(
            engine.create_role("developer", None),
            Err(RbacError::DuplicateRoleName("developer".to_string()))
        );
    }

    #[test]
    fn test_self_parent_rejected() {
        let (engine, role) = engine_with_role("developer");
        assert_eq!(engine.set_parent(role, Some(role)), Err(RbacError::CycleDetected));
    }

    #[test]
    fn test_two_role_cycle_rejected() {
        let engine = RbacEngine::new();
        let a = engine.create_role("a", None).unwrap();
        let b = engine.create_role("b", Some(a)).unwrap();
        assert_eq!(engine.set_parent(a, Some(b)), Err(RbacError::CycleDetected));
    }

    #[test]
    fn test_permission_inherited_through_parent() {
        let engine = RbacEngine::new();
        let admin = engine.create_role("admin", None).unwrap();
        let dev = engine.create_role("developer", Some(admin)).unwrap();
        let perm = engine
            .define_permission("task:delete", ResourceType::Task, PermissionType::Delete)
            .unwrap();
        engine.grant_permission(admin, perm).unwrap();

        let user = Uuid::new_v4();
        engine.assign_role(user, dev, Uuid::new_v4()).unwrap();

        assert!(engine.has_permission(user, ResourceType::Task, PermissionType::Delete, None));
        assert!(!engine.has_permission(user, ResourceType::Task, PermissionType::Create, None));
    }

    #[test]
    fn test_inactive_role_breaks_chain() {
        let engine = RbacEngine::new();
        let admin = engine.create_role("admin", None).unwrap();
        let dev = engine.create_role("developer", Some(admin)).unwrap();
        let perm = engine
            .define_permission("task:read", ResourceType::Task, PermissionType::Read)
            .unwrap();
        engine.grant_permission(admin, perm).unwrap();

        let user = Uuid::new_v4();
        engine.assign_role(user, dev, Uuid::new_v4()).unwrap();
        assert!(engine.has_permission(user, ResourceType::Task, PermissionType::Read, None));

        engine.set_role_active(dev, false).unwrap();
        assert!(!engine.has_permission(user, ResourceType::Task, PermissionType::Read, None));
    }

    #[test]
    fn test_scoped_grant_limited_to_project() {
        let engine = RbacEngine::new();
        let reviewer = engine.create_role("reviewer", None).unwrap();
        let perm = engine
            .define_permission(
                "requirement:approve",
                ResourceType::Requirement,
                PermissionType::Approve,
            )
            .unwrap();
        engine.grant_permission(reviewer, perm).unwrap();

        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        engine
            .grant_scoped(user, project, reviewer, Uuid::new_v4(), None)
            .unwrap();

        assert!(engine.has_permission(
            user,
            ResourceType::Requirement,
            PermissionType::Approve,
            Some(project)
        ));
        assert!(!engine.has_permission(
            user,
            ResourceType::Requirement,
            PermissionType::Approve,
            Some(Uuid::new_v4())
        ));
        assert!(!engine.has_permission(
            user,
            ResourceType::Requirement,
            PermissionType::Approve,
            None
        ));
    }

    #[test]
    fn test_expired_scoped_grant_ignored() {
        let engine = RbacEngine::new();
        let reviewer = engine.create_role("reviewer", None).unwrap();
        let perm = engine
            .define_permission("task:update", ResourceType::Task, PermissionType::Update)
            .unwrap();
        engine.grant_permission(reviewer, perm).unwrap();

        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        engine
            .grant_scoped(
                user,
                project,
                reviewer,
                Uuid::new_v4(),
                Some(Utc::now() - chrono::Duration::seconds(1)),
            )
            .unwrap();

        assert!(!engine.has_permission(
            user,
            ResourceType::Task,
            PermissionType::Update,
            Some(project)
        ));
    }

    #[test]
    fn test_reassignment_is_noop() {
        let (engine, role) = engine_with_role("developer");
        let user = Uuid::new_v4();
        let assigner = Uuid::new_v4();
        engine.assign_role(user, role, assigner).unwrap();
        engine.assign_role(user, role, Uuid::new_v4()).unwrap();

        let state = engine.inner.read().unwrap();
        let assignments = state.assignments.get(&user).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].assigned_by, assigner);
    }
}
