mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::local_config;
use keystone_identity::models::{PermissionType, Principal, ResourceType};
use keystone_identity::services::{InMemoryDirectory, PrincipalStore, RbacEngine, RbacError};
use keystone_identity::IdentityCore;
use uuid::Uuid;

#[test]
fn permissions_inherit_down_a_three_level_chain() {
    let engine = RbacEngine::new();
    let admin = engine.create_role("admin", None).unwrap();
    let maintainer = engine.create_role("maintainer", Some(admin)).unwrap();
    let developer = engine.create_role("developer", Some(maintainer)).unwrap();

    let deploy = engine
        .define_permission(
            "deployment:deploy",
            ResourceType::Deployment,
            PermissionType::Deploy,
        )
        .unwrap();
    let read = engine
        .define_permission("task:read", ResourceType::Task, PermissionType::Read)
        .unwrap();
    engine.grant_permission(admin, deploy).unwrap();
    engine.grant_permission(developer, read).unwrap();

    let user = Uuid::new_v4();
    engine.assign_role(user, developer, Uuid::new_v4()).unwrap();

    // Own grant plus everything inherited from ancestors
    assert!(engine.has_permission(user, ResourceType::Task, PermissionType::Read, None));
    assert!(engine.has_permission(
        user,
        ResourceType::Deployment,
        PermissionType::Deploy,
        None
    ));

    // Inheritance flows down only; a user on the parent does not gain
    // the child's grants
    let admin_user = Uuid::new_v4();
    engine
        .assign_role(admin_user, admin, Uuid::new_v4())
        .unwrap();
    assert!(!engine.has_permission(admin_user, ResourceType::Task, PermissionType::Read, None));
}

#[test]
fn cycle_through_three_roles_rejected() {
    let engine = RbacEngine::new();
    let a = engine.create_role("a", None).unwrap();
    let b = engine.create_role("b", Some(a)).unwrap();
    let c = engine.create_role("c", Some(b)).unwrap();

    assert_eq!(engine.set_parent(a, Some(c)), Err(RbacError::CycleDetected));

    // The failed attempt left the hierarchy untouched
    assert!(engine.set_parent(a, None).is_ok());
}

#[test]
fn unknown_parent_rejected() {
    let engine = RbacEngine::new();
    assert_eq!(
        engine.create_role("orphan", Some(keystone_identity::models::RoleId::new())),
        Err(RbacError::UnknownRole)
    );
}

#[test]
fn scoped_grant_with_future_expiry_applies_until_then() {
    let engine = RbacEngine::new();
    let reviewer = engine.create_role("reviewer", None).unwrap();
    let approve = engine
        .define_permission(
            "requirement:approve",
            ResourceType::Requirement,
            PermissionType::Approve,
        )
        .unwrap();
    engine.grant_permission(reviewer, approve).unwrap();

    let user = Uuid::new_v4();
    let project = Uuid::new_v4();
    engine
        .grant_scoped(
            user,
            project,
            reviewer,
            Uuid::new_v4(),
            Some(Utc::now() + Duration::hours(1)),
        )
        .unwrap();

    assert!(engine.has_permission(
        user,
        ResourceType::Requirement,
        PermissionType::Approve,
        Some(project)
    ));
}

#[test]
fn global_assignment_applies_in_any_scope() {
    let engine = RbacEngine::new();
    let admin = engine.create_role("admin", None).unwrap();
    let perm = engine
        .define_permission("project:admin", ResourceType::Project, PermissionType::Admin)
        .unwrap();
    engine.grant_permission(admin, perm).unwrap();

    let user = Uuid::new_v4();
    engine.assign_role(user, admin, Uuid::new_v4()).unwrap();

    assert!(engine.has_permission(user, ResourceType::Project, PermissionType::Admin, None));
    assert!(engine.has_permission(
        user,
        ResourceType::Project,
        PermissionType::Admin,
        Some(Uuid::new_v4())
    ));
}

#[test]
fn no_grants_means_no_permission() {
    let engine = RbacEngine::new();
    assert!(!engine.has_permission(
        Uuid::new_v4(),
        ResourceType::Task,
        PermissionType::Read,
        None
    ));
}

#[tokio::test]
async fn core_authorize_denies_unusable_principal() {
    let store = Arc::new(InMemoryDirectory::new());
    let core = IdentityCore::new(&local_config(), store.clone()).unwrap();

    let mut principal = Principal::new_mirrored(
        "jdoe".to_string(),
        "jdoe@example.com".to_string(),
        "Jane".to_string(),
        "Doe".to_string(),
        true,
    );
    store.insert(principal.clone()).await.unwrap();

    let role = core.rbac().create_role("admin", None).unwrap();
    let perm = core
        .rbac()
        .define_permission("task:read", ResourceType::Task, PermissionType::Read)
        .unwrap();
    core.rbac().grant_permission(role, perm).unwrap();
    core.rbac()
        .assign_role(principal.id, role, Uuid::new_v4())
        .unwrap();

    assert!(core.authorize(&principal, ResourceType::Task, PermissionType::Read, None));

    principal.is_active = false;
    assert!(!core.authorize(&principal, ResourceType::Task, PermissionType::Read, None));
}
