//! Principal model - authenticated identities (human users and AI agents).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a principal is a human user or an autonomous agent.
///
/// Agent actions additionally pass through the risk gate; see
/// `services::gating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Human,
    Agent,
}

/// An authenticated identity on whose behalf requests are made.
///
/// Principals are never hard-deleted; deactivation flips `is_deleted` so
/// historical role, permission, and audit references stay intact.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub kind: PrincipalKind,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_deleted: bool,
    /// Absent for externally-mirrored principals, so a local-credential
    /// attempt against them can never verify.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Create a locally-registered principal with a usable credential hash.
    pub fn new_local(
        username: String,
        email: String,
        first_name: String,
        last_name: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            first_name,
            last_name,
            kind: PrincipalKind::Human,
            is_active: true,
            is_verified: false,
            is_deleted: false,
            password_hash: Some(password_hash),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a mirror of an externally-authenticated identity.
    ///
    /// No credential material is stored for mirrored principals.
    pub fn new_mirrored(
        username: String,
        email: String,
        first_name: String,
        last_name: String,
        is_verified: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            first_name,
            last_name,
            kind: PrincipalKind::Human,
            is_active: true,
            is_verified,
            is_deleted: false,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an agent principal. Agents authenticate like any other
    /// principal but their actions are risk-gated.
    pub fn new_agent(name: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: name.clone(),
            email,
            first_name: name,
            last_name: String::new(),
            kind: PrincipalKind::Agent,
            is_active: true,
            is_verified: true,
            is_deleted: false,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// An authenticated request is only honored for live principals.
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// Request to register a new principal.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Token pair returned after successful authentication.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
