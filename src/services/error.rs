use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures while establishing who the caller is.
///
/// These surface uniformly to the caller: the HTTP mapping never reveals
/// whether the username, the password, or the token was the specific cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    ExpiredToken,

    #[error("malformed token")]
    MalformedToken,

    #[error("wrong token type for this operation")]
    WrongTokenType,

    #[error("unknown principal")]
    UnknownPrincipal,

    #[error("principal is inactive")]
    InactivePrincipal,
}

/// Failures while deciding what an authenticated principal may do.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AuthorizationError {
    #[error("insufficient permission for the requested action")]
    InsufficientPermission,

    #[error("declared risk exceeds the agent's risk ceiling")]
    RiskCeilingExceeded,
}

/// Failures talking to the external identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("identity provider unavailable")]
    IdentityProviderUnavailable,

    #[error("identity provider rejected the request")]
    IdentityProviderRejected,
}

/// Registration conflicts. The one error family surfaced with a specific,
/// actionable distinction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("username already taken")]
    DuplicateUsername,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("account already exists at the identity provider")]
    DuplicateAccount,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            // Uniform message: never distinguish username vs password vs token cause
            IdentityError::Authentication(e) => {
                tracing::debug!(cause = %e, "Authentication failed");
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            IdentityError::Authorization(e) => {
                tracing::debug!(cause = %e, "Authorization denied");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
            // Full detail stays in the logs; the caller only sees unavailability
            IdentityError::Upstream(e) => {
                tracing::error!(error = %e, "Identity provider error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Authentication service unavailable".to_string(),
                )
            }
            IdentityError::Conflict(e) => (StatusCode::CONFLICT, e.to_string()),
            IdentityError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
