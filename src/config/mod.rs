use secrecy::Secret;
use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which authentication backend this process uses.
///
/// Read once at startup and immutable thereafter; no per-request branching
/// beyond the resolver's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Local,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Clone)]
pub struct IdentityConfig {
    pub environment: Environment,
    pub auth_mode: AuthMode,
    pub tokens: TokenConfig,
    pub oidc: OidcConfig,
}

/// Local token issuance settings (shared-secret signing).
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Secret<String>,
    pub algorithm: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

/// External identity provider settings (Keycloak-style OIDC).
#[derive(Clone)]
pub struct OidcConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub admin_username: String,
    pub admin_password: Secret<String>,
    pub request_timeout_seconds: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str.parse().map_err(ConfigError::Invalid)?;
        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            environment,
            auth_mode: get_env("AUTH_MODE", Some("local"), is_prod)?
                .parse()
                .map_err(ConfigError::Invalid)?,
            tokens: TokenConfig {
                secret: Secret::new(get_env(
                    "TOKEN_SECRET",
                    Some("dev-secret-change-me"),
                    is_prod,
                )?),
                algorithm: get_env("TOKEN_ALGORITHM", Some("HS256"), is_prod)?,
                access_token_expiry_minutes: get_env(
                    "ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("30"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid(e.to_string()))?,
                refresh_token_expiry_days: get_env(
                    "REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid(e.to_string()))?,
            },
            oidc: OidcConfig {
                base_url: get_env("OIDC_BASE_URL", Some("http://localhost:8080"), is_prod)?,
                realm: get_env("OIDC_REALM", Some("keystone"), is_prod)?,
                client_id: get_env("OIDC_CLIENT_ID", Some("keystone-backend"), is_prod)?,
                client_secret: Secret::new(get_env("OIDC_CLIENT_SECRET", Some(""), is_prod)?),
                admin_username: get_env("OIDC_ADMIN_USERNAME", Some("admin"), is_prod)?,
                admin_password: Secret::new(get_env("OIDC_ADMIN_PASSWORD", Some("admin"), is_prod)?),
                request_timeout_seconds: get_env(
                    "OIDC_REQUEST_TIMEOUT_SECONDS",
                    Some("10"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid(e.to_string()))?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.access_token_expiry_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "ACCESS_TOKEN_EXPIRY_MINUTES must be positive".to_string(),
            ));
        }

        if self.tokens.refresh_token_expiry_days <= 0 {
            return Err(ConfigError::Invalid(
                "REFRESH_TOKEN_EXPIRY_DAYS must be positive".to_string(),
            ));
        }

        // Local tokens are signed with a shared secret, so only the
        // HMAC family of algorithms is valid here.
        match self.tokens.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "TOKEN_ALGORITHM must be one of HS256/HS384/HS512, got {}",
                    other
                )));
            }
        }

        if self.oidc.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "OIDC_REQUEST_TIMEOUT_SECONDS must be positive".to_string(),
            ));
        }

        if self.auth_mode == AuthMode::External && self.environment == Environment::Prod {
            use secrecy::ExposeSecret;
            if self.oidc.base_url.is_empty() || self.oidc.client_id.is_empty() {
                return Err(ConfigError::Invalid(
                    "OIDC_BASE_URL and OIDC_CLIENT_ID are required in external mode".to_string(),
                ));
            }
            if self.oidc.client_secret.expose_secret().is_empty() {
                return Err(ConfigError::Invalid(
                    "OIDC_CLIENT_SECRET is required in external mode".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(ConfigError::Missing(key.to_string()))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(ConfigError::Missing(key.to_string()))
            }
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(AuthMode::Local),
            "external" => Ok(AuthMode::External),
            _ => Err(format!("Invalid auth mode: {}", s)),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
