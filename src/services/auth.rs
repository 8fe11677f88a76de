//! Local account lifecycle: registration, login, token refresh,
//! password change, and soft deactivation.
//!
//! Login failures collapse to a single invalid-credentials error so the
//! response never reveals whether the account exists or which field was
//! wrong.

use std::sync::Arc;

use crate::models::{Principal, RegisterRequest, TokenResponse};
use crate::services::directory::PrincipalStore;
use crate::services::error::{AuthenticationError, ConflictError, IdentityError};
use crate::services::jwt::JwtService;
use crate::utils::password::{
    hash_password_async, verify_password_async, Password, PasswordHashString,
};

pub struct AccountService {
    store: Arc<dyn PrincipalStore>,
    jwt: JwtService,
}

impl AccountService {
    pub fn new(store: Arc<dyn PrincipalStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Create a local account. Email uniqueness is checked before
    /// username so a request failing both reports the email conflict.
    pub async fn register(&self, req: RegisterRequest) -> Result<Principal, IdentityError> {
        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(ConflictError::DuplicateEmail.into());
        }
        if self.store.find_by_username(&req.username).await?.is_some() {
            return Err(ConflictError::DuplicateUsername.into());
        }

        let hash = hash_password_async(Password::new(req.password)).await?;
        let principal = Principal::new_local(
            req.username,
            req.email,
            req.first_name,
            req.last_name,
            hash.into_string(),
        );

        self.store.insert(principal.clone()).await?;
        tracing::info!(user_id = %principal.id, username = %principal.username, "Registered local account");
        Ok(principal)
    }

    /// Verify credentials and issue a token pair. The identifier may be
    /// a username or an email.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<TokenResponse, IdentityError> {
        let principal = match self.store.find_by_username(identifier).await? {
            Some(p) => Some(p),
            None => self.store.find_by_email(identifier).await?,
        };

        // Unknown account, mirrored account, and wrong password are
        // indistinguishable to the caller.
        let principal = principal.ok_or(AuthenticationError::InvalidCredentials)?;
        let hash = principal
            .password_hash
            .clone()
            .ok_or(AuthenticationError::InvalidCredentials)?;

        let verified = verify_password_async(
            Password::new(password.to_string()),
            PasswordHashString::new(hash),
        )
        .await;
        if verified.is_err() {
            return Err(AuthenticationError::InvalidCredentials.into());
        }

        if !principal.is_usable() {
            return Err(AuthenticationError::InactivePrincipal.into());
        }

        tracing::info!(user_id = %principal.id, "Login succeeded");
        self.issue_tokens(&principal)
    }

    /// Exchange a refresh token for a fresh pair. The principal must
    /// still exist and be usable at exchange time.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdentityError> {
        let claims = self.jwt.verify_refresh_token(refresh_token)?;
        let id = claims
            .sub
            .parse::<uuid::Uuid>()
            .map_err(|_| AuthenticationError::MalformedToken)?;

        let principal = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AuthenticationError::UnknownPrincipal)?;

        if !principal.is_usable() {
            return Err(AuthenticationError::InactivePrincipal.into());
        }

        self.issue_tokens(&principal)
    }

    /// Rotate a password after verifying the current one.
    pub async fn change_password(
        &self,
        principal_id: uuid::Uuid,
        current: &str,
        new: &str,
    ) -> Result<(), IdentityError> {
        let mut principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthenticationError::UnknownPrincipal)?;

        let hash = principal
            .password_hash
            .clone()
            .ok_or(AuthenticationError::InvalidCredentials)?;
        let verified = verify_password_async(
            Password::new(current.to_string()),
            PasswordHashString::new(hash),
        )
        .await;
        if verified.is_err() {
            return Err(AuthenticationError::InvalidCredentials.into());
        }

        let new_hash = hash_password_async(Password::new(new.to_string())).await?;
        principal.password_hash = Some(new_hash.into_string());
        principal.updated_at = chrono::Utc::now();
        self.store.update(principal).await?;

        tracing::info!(user_id = %principal_id, "Password changed");
        Ok(())
    }

    /// Soft-delete an account. Outstanding tokens stop resolving at the
    /// next request.
    pub async fn deactivate(&self, principal_id: uuid::Uuid) -> Result<(), IdentityError> {
        let mut principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or(AuthenticationError::UnknownPrincipal)?;

        principal.is_active = false;
        principal.is_deleted = true;
        principal.updated_at = chrono::Utc::now();
        self.store.update(principal).await?;

        tracing::info!(user_id = %principal_id, "Account deactivated");
        Ok(())
    }

    fn issue_tokens(&self, principal: &Principal) -> Result<TokenResponse, IdentityError> {
        let (access_token, refresh_token) =
            self.jwt.issue_token_pair(&principal.id.to_string())?;
        Ok(TokenResponse::new(
            access_token,
            refresh_token,
            self.jwt.access_token_expiry_seconds(),
        ))
    }
}
