//! Local mirroring of externally-authenticated principals.
//!
//! Principals whose credentials live at the external provider still get
//! a local record so roles, scoped grants, and audit fields can attach
//! to a stable local id. Mirrored records never hold a password hash.

use std::sync::Arc;

use crate::models::Principal;
use crate::services::directory::PrincipalStore;
use crate::services::error::IdentityError;
use crate::services::oidc::UserProfile;

pub struct MirrorSync {
    store: Arc<dyn PrincipalStore>,
}

impl MirrorSync {
    pub fn new(store: Arc<dyn PrincipalStore>) -> Self {
        Self { store }
    }

    /// Upsert the local record for a provider profile, keyed by email.
    /// Updates touch only provider-owned fields, and only those the
    /// provider actually supplied; local state such as activation and
    /// role assignments is left alone.
    pub async fn sync(&self, profile: &UserProfile) -> Result<Principal, IdentityError> {
        match self.store.find_by_email(&profile.email).await? {
            Some(mut existing) => {
                if let Some(given_name) = &profile.given_name {
                    existing.first_name = given_name.clone();
                }
                if let Some(family_name) = &profile.family_name {
                    existing.last_name = family_name.clone();
                }
                if let Some(email_verified) = profile.email_verified {
                    existing.is_verified = email_verified;
                }
                existing.updated_at = chrono::Utc::now();
                self.store.update(existing.clone()).await?;
                Ok(existing)
            }
            None => {
                let principal = Principal::new_mirrored(
                    profile.preferred_username.clone(),
                    profile.email.clone(),
                    profile.given_name.clone().unwrap_or_default(),
                    profile.family_name.clone().unwrap_or_default(),
                    profile.email_verified.unwrap_or(false),
                );
                tracing::info!(user_id = %principal.id, username = %principal.username, "Mirrored external principal");
                self.store.insert(principal.clone()).await?;
                Ok(principal)
            }
        }
    }
}
