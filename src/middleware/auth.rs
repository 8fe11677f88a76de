use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::models::Principal;
use crate::services::error::{AuthenticationError, IdentityError};
use crate::IdentityCore;

/// Middleware to require an authenticated principal.
///
/// Resolves the bearer token through the configured resolver and stores
/// the principal in request extensions for downstream handlers.
pub async fn principal_middleware(
    State(core): State<Arc<IdentityCore>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let token = match token {
        Some(token) => token.to_string(),
        None => {
            return Err(
                IdentityError::from(AuthenticationError::MalformedToken).into_response(),
            );
        }
    };

    let principal = core
        .resolve_principal(&token)
        .await
        .map_err(IntoResponse::into_response)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Extractor to easily get the resolved principal in handlers.
pub struct CurrentPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Principal missing from request extensions" })),
        ))?;

        Ok(CurrentPrincipal(principal.clone()))
    }
}
