//! Identity and access-control core for a multi-tenant delivery
//! platform: pluggable authentication (local credentials or an external
//! OIDC provider), principal resolution, hierarchical RBAC with
//! project-scoped grants, and a risk gate for agent-initiated actions.

pub mod config;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use config::{AuthMode, IdentityConfig};
use models::{PermissionType, Principal, ResourceType};
use services::directory::PrincipalStore;
use services::error::IdentityError;
use services::gating::AgentGate;
use services::jwt::JwtService;
use services::mirror::MirrorSync;
use services::oidc::OidcClient;
use services::rbac::RbacEngine;
use services::resolver::PrincipalResolver;

/// Application-wide identity facade.
///
/// The resolution strategy is chosen once from configuration at
/// construction; everything downstream is mode-agnostic.
pub struct IdentityCore {
    resolver: PrincipalResolver,
    rbac: Arc<RbacEngine>,
    gate: AgentGate,
}

impl IdentityCore {
    pub fn new(
        config: &IdentityConfig,
        store: Arc<dyn PrincipalStore>,
    ) -> Result<Self, anyhow::Error> {
        let resolver = match config.auth_mode {
            AuthMode::Local => PrincipalResolver::Local {
                jwt: JwtService::new(&config.tokens)?,
                store,
            },
            AuthMode::External => PrincipalResolver::External {
                oidc: OidcClient::new(config.oidc.clone())?,
                mirror: MirrorSync::new(store),
            },
        };

        let rbac = Arc::new(RbacEngine::new());
        let gate = AgentGate::new(rbac.clone());

        tracing::info!(auth_mode = ?config.auth_mode, "Identity core initialized");
        Ok(Self { resolver, rbac, gate })
    }

    /// Resolve a bearer token to a usable principal.
    pub async fn resolve_principal(&self, token: &str) -> Result<Principal, IdentityError> {
        self.resolver.resolve(token).await
    }

    /// Permission check for an already-resolved principal. A principal
    /// that has become unusable since resolution is denied everything.
    pub fn authorize(
        &self,
        principal: &Principal,
        resource: ResourceType,
        action: PermissionType,
        scope: Option<uuid::Uuid>,
    ) -> bool {
        principal.is_usable() && self.rbac.has_permission(principal.id, resource, action, scope)
    }

    pub fn rbac(&self) -> &RbacEngine {
        &self.rbac
    }

    pub fn gate(&self) -> &AgentGate {
        &self.gate
    }
}
