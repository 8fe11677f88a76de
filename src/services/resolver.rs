//! Bearer-token to principal resolution.
//!
//! The resolution strategy is fixed at startup from the configured
//! authentication mode; a running process never mixes local and
//! external verification.

use std::sync::Arc;

use crate::models::Principal;
use crate::services::directory::PrincipalStore;
use crate::services::error::{AuthenticationError, IdentityError};
use crate::services::jwt::JwtService;
use crate::services::mirror::MirrorSync;
use crate::services::oidc::OidcClient;

pub enum PrincipalResolver {
    /// Self-issued HS256 tokens checked against the local directory.
    Local {
        jwt: JwtService,
        store: Arc<dyn PrincipalStore>,
    },
    /// Provider-issued RS256 tokens, mirrored into the local directory.
    External { oidc: OidcClient, mirror: MirrorSync },
}

impl PrincipalResolver {
    /// Resolve a bearer token to a usable principal. Any token that does
    /// not map to an active, non-deleted record is refused.
    pub async fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        match self {
            PrincipalResolver::Local { jwt, store } => {
                let claims = jwt.verify_access_token(token)?;
                let id = claims
                    .sub
                    .parse::<uuid::Uuid>()
                    .map_err(|_| AuthenticationError::MalformedToken)?;

                let principal = store
                    .find_by_id(id)
                    .await?
                    .ok_or(AuthenticationError::UnknownPrincipal)?;

                if !principal.is_usable() {
                    return Err(AuthenticationError::InactivePrincipal.into());
                }
                Ok(principal)
            }
            PrincipalResolver::External { oidc, mirror } => {
                oidc.validate(token).await?;
                let profile = oidc.fetch_userinfo(token).await?;
                let principal = mirror.sync(&profile).await?;

                if !principal.is_usable() {
                    return Err(AuthenticationError::InactivePrincipal.into());
                }
                Ok(principal)
            }
        }
    }
}
