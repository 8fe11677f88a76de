use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::TokenConfig;
use crate::services::error::AuthenticationError;

/// Marker carried by refresh tokens. Access tokens omit the claim entirely;
/// its absence is what marks them as access tokens.
const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Local token issuer and verifier (shared-secret signing).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for locally issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (principal ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// `"refresh"` for refresh tokens; absent for access tokens
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenClaims {
    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(REFRESH_TOKEN_TYPE)
    }
}

impl JwtService {
    pub fn new(config: &TokenConfig) -> Result<Self, anyhow::Error> {
        let algorithm: Algorithm = config
            .algorithm
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid token algorithm {}: {}", config.algorithm, e))?;

        let secret = config.secret.expose_secret().as_bytes();

        tracing::info!(algorithm = %config.algorithm, "JWT service initialized");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    /// Issue an access token for a subject with an explicit lifetime.
    pub fn issue_access_token(&self, subject: &str, ttl: Duration) -> Result<String, anyhow::Error> {
        let now = Utc::now();

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: None,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Issue a refresh token for a subject using the configured lifetime.
    pub fn issue_refresh_token(&self, subject: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            token_type: Some(REFRESH_TOKEN_TYPE.to_string()),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    /// Issue an access/refresh pair using configured lifetimes.
    pub fn issue_token_pair(&self, subject: &str) -> Result<(String, String), anyhow::Error> {
        let access = self.issue_access_token(subject, self.access_token_ttl())?;
        let refresh = self.issue_refresh_token(subject)?;
        Ok((access, refresh))
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// Callers that care about the access/refresh distinction must use
    /// `verify_access_token` / `verify_refresh_token` instead.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthenticationError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data =
            decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
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

        Ok(token_data.claims)
    }

    /// Verify a token presented where an access token is required.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthenticationError> {
        let claims = self.verify_token(token)?;
        if claims.is_refresh() {
            return Err(AuthenticationError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Verify a token presented where a refresh token is required.
    pub fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, AuthenticationError> {
        let claims = self.verify_token(token)?;
        if !claims.is_refresh() {
            return Err(AuthenticationError::WrongTokenType);
        }
        Ok(claims)
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiry_minutes)
    }

    /// Access token lifetime in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}
