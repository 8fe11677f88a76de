//! External identity provider client (Keycloak-style OIDC).
//!
//! Forwards password/refresh grants, validates provider-issued RS256
//! tokens against the published key set, retrieves user info, provisions
//! accounts through the admin API, and performs best-effort logout.
//! Every outbound call carries the configured timeout; a timed-out call
//! is reported as provider-unavailable, never left pending.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::OidcConfig;
use crate::models::RegisterRequest;
use crate::services::error::{AuthenticationError, ConflictError, IdentityError, UpstreamError};
use crate::services::keys::{JwkSet, KeyMaterialCache};

/// Token pair as issued by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Claims of a validated provider-issued access token.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Profile returned by the provider's userinfo endpoint.
///
/// The profile claims are scope-dependent and may be absent; an absent
/// claim means "not supplied", not "empty", so consumers must not treat
/// `None` as a value to store.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub sub: String,
    pub preferred_username: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionUserRequest {
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    enabled: bool,
    email_verified: bool,
    credentials: Vec<ProvisionCredential>,
}

#[derive(Debug, Serialize)]
struct ProvisionCredential {
    #[serde(rename = "type")]
    credential_type: String,
    value: String,
    temporary: bool,
}

#[derive(Debug, Deserialize)]
struct ServiceTokenResponse {
    access_token: String,
}

/// Client for the external OIDC identity provider.
#[derive(Clone)]
pub struct OidcClient {
    http: Client,
    config: OidcConfig,
    keys: Arc<KeyMaterialCache>,
}

impl OidcClient {
    pub fn new(config: OidcConfig) -> Result<Self, anyhow::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            config,
            keys: Arc::new(KeyMaterialCache::new()),
        })
    }

    fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.config.base_url, self.config.realm)
    }

    /// Issuer value checked on every validation.
    pub fn issuer(&self) -> String {
        self.realm_url()
    }

    fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    fn userinfo_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/userinfo", self.realm_url())
    }

    fn jwks_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.realm_url())
    }

    fn logout_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/logout", self.realm_url())
    }

    fn admin_users_endpoint(&self) -> String {
        format!(
            "{}/admin/realms/{}/users",
            self.config.base_url, self.config.realm
        )
    }

    fn service_token_endpoint(&self) -> String {
        format!(
            "{}/realms/master/protocol/openid-connect/token",
            self.config.base_url
        )
    }

    /// Forward a password grant to the provider.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ProviderTokens, IdentityError> {
        let response = self
            .http
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("username", username),
                ("password", password),
                ("scope", "openid profile email"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token", e))?;

        match response.status() {
            StatusCode::OK => response.json::<ProviderTokens>().await.map_err(|e| {
                tracing::error!(error = %e, "Malformed token response from provider");
                UpstreamError::IdentityProviderRejected.into()
            }),
            StatusCode::UNAUTHORIZED => Err(AuthenticationError::InvalidCredentials.into()),
            status => Err(rejected("authentication", status, response).await),
        }
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens, IdentityError> {
        let response = self
            .http
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token", e))?;

        match response.status() {
            StatusCode::OK => response.json::<ProviderTokens>().await.map_err(|e| {
                tracing::error!(error = %e, "Malformed token response from provider");
                UpstreamError::IdentityProviderRejected.into()
            }),
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => {
                Err(AuthenticationError::InvalidCredentials.into())
            }
            status => Err(rejected("token refresh", status, response).await),
        }
    }

    /// Validate a provider-issued token locally against the cached key
    /// set: key lookup by `kid`, then signature, audience, issuer, and
    /// expiry checks.
    pub async fn validate(&self, token: &str) -> Result<ExternalClaims, IdentityError> {
        let header =
            decode_header(token).map_err(|_| AuthenticationError::MalformedToken)?;
        let kid = header.kid.ok_or(AuthenticationError::InvalidSignature)?;

        let key_set = self.keys.key_set(|| self.fetch_key_set()).await?;
        let jwk = key_set
            .find(&kid)
            .ok_or(AuthenticationError::InvalidSignature)?;
        let key = jwk.decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);

        let data = decode::<ExternalClaims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AuthenticationError::ExpiredToken
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthenticationError::InvalidSignature
                }
                _ => AuthenticationError::MalformedToken,
            }
        })?;

        Ok(data.claims)
    }

    /// Retrieve the authenticated user's profile from the provider.
    pub async fn fetch_userinfo(&self, token: &str) -> Result<UserProfile, IdentityError> {
        let response = self
            .http
            .get(self.userinfo_endpoint())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("userinfo", e))?;

        match response.status() {
            StatusCode::OK => response.json::<UserProfile>().await.map_err(|e| {
                tracing::error!(error = %e, "Malformed userinfo response from provider");
                UpstreamError::IdentityProviderRejected.into()
            }),
            StatusCode::UNAUTHORIZED => Err(AuthenticationError::MalformedToken.into()),
            status => Err(rejected("userinfo", status, response).await),
        }
    }

    /// Create an account at the provider through its admin API, returning
    /// the provider-side account id.
    pub async fn provision_user(&self, req: &RegisterRequest) -> Result<String, IdentityError> {
        let service_token = self
            .keys
            .service_token(|| self.fetch_service_token())
            .await?
            .to_string();

        let payload = ProvisionUserRequest {
            username: req.username.clone(),
            email: req.email.clone(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            enabled: true,
            email_verified: false,
            credentials: vec![ProvisionCredential {
                credential_type: "password".to_string(),
                value: req.password.clone(),
                temporary: false,
            }],
        };

        let response = self
            .http
            .post(self.admin_users_endpoint())
            .bearer_auth(service_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("admin users", e))?;

        match response.status() {
            StatusCode::CREATED => {
                // Provider reports the new account id via the Location header
                let external_id = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| loc.rsplit('/').next())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        tracing::error!("Provider account creation returned no Location header");
                        IdentityError::from(UpstreamError::IdentityProviderRejected)
                    })?;

                tracing::info!(username = %req.username, external_id = %external_id, "Provisioned account at identity provider");
                Ok(external_id)
            }
            StatusCode::CONFLICT => Err(ConflictError::DuplicateAccount.into()),
            status => Err(rejected("account provisioning", status, response).await),
        }
    }

    /// Best-effort refresh-token revocation. Failure is non-fatal.
    pub async fn logout(&self, refresh_token: &str) -> bool {
        let result = self
            .http
            .post(self.logout_endpoint())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await;

        match result {
            Ok(response) => response.status() == StatusCode::NO_CONTENT,
            Err(e) => {
                tracing::warn!(error = %e, "Provider logout failed");
                false
            }
        }
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, UpstreamError> {
        let response = self
            .http
            .get(self.jwks_endpoint())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch provider key set");
                UpstreamError::IdentityProviderUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "Provider key set endpoint error");
            return Err(UpstreamError::IdentityProviderRejected);
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed provider key set");
            UpstreamError::IdentityProviderRejected
        })
    }

    async fn fetch_service_token(&self) -> Result<String, UpstreamError> {
        let response = self
            .http
            .post(self.service_token_endpoint())
            .form(&[
                ("grant_type", "password"),
                ("client_id", "admin-cli"),
                ("username", self.config.admin_username.as_str()),
                ("password", self.config.admin_password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to obtain service-account token");
                UpstreamError::IdentityProviderUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "Service-account grant rejected");
            return Err(UpstreamError::IdentityProviderRejected);
        }

        response
            .json::<ServiceTokenResponse>()
            .await
            .map(|r| r.access_token)
            .map_err(|e| {
                tracing::error!(error = %e, "Malformed service-account token response");
                UpstreamError::IdentityProviderRejected
            })
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> IdentityError {
    tracing::error!(endpoint = endpoint, error = %e, "Identity provider transport failure");
    UpstreamError::IdentityProviderUnavailable.into()
}

async fn rejected(operation: &str, status: StatusCode, response: reqwest::Response) -> IdentityError {
    let body = response.text().await.unwrap_or_default();
    tracing::error!(operation = operation, status = %status, body = %body, "Identity provider rejected request");
    UpstreamError::IdentityProviderRejected.into()
}
