//! Key material cache for external token verification.
//!
//! Holds the provider's published key set and a service-account token.
//! Both are populated lazily on first use and kept for the process
//! lifetime; invalidation is restart-only. `OnceCell` serializes
//! concurrent initializers, so a burst of cache misses produces a single
//! upstream fetch, and a failed fetch leaves the cell empty for the next
//! caller to retry.

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::future::Future;
use tokio::sync::OnceCell;

use crate::services::error::UpstreamError;

/// One published verification key (RSA, as served by the provider's
/// JWKS endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    /// Modulus, base64url
    pub n: String,
    /// Exponent, base64url
    pub e: String,
}

impl Jwk {
    pub fn decoding_key(&self) -> Result<DecodingKey, UpstreamError> {
        DecodingKey::from_rsa_components(&self.n, &self.e).map_err(|e| {
            tracing::error!(kid = %self.kid, error = %e, "Unusable key in provider key set");
            UpstreamError::IdentityProviderRejected
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Default)]
pub struct KeyMaterialCache {
    key_set: OnceCell<JwkSet>,
    service_token: OnceCell<String>,
}

impl KeyMaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key set, fetching it once on first use.
    pub async fn key_set<F, Fut>(&self, fetch: F) -> Result<&JwkSet, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<JwkSet, UpstreamError>>,
    {
        self.key_set.get_or_try_init(fetch).await
    }

    /// Return the cached service-account token, obtaining it once on
    /// first use.
    pub async fn service_token<F, Fut>(&self, fetch: F) -> Result<&str, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, UpstreamError>>,
    {
        self.service_token
            .get_or_try_init(fetch)
            .await
            .map(String::as_str)
    }
}
