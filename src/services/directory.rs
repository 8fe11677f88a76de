//! Principal directory - the store seam for principal records.
//!
//! Persistence backends live behind [`PrincipalStore`]; the core ships an
//! in-memory implementation. Lookups return soft-deleted records too so
//! uniqueness and auditability survive deactivation; callers gate on
//! `Principal::is_usable`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::Principal;

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, anyhow::Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, anyhow::Error>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, anyhow::Error>;

    async fn insert(&self, principal: Principal) -> Result<(), anyhow::Error>;

    /// Replace the stored record with the same id.
    async fn update(&self, principal: Principal) -> Result<(), anyhow::Error>;
}

/// In-memory principal directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for InMemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, anyhow::Error> {
        let principals = self
            .principals
            .read()
            .map_err(|_| anyhow::anyhow!("principal store lock poisoned"))?;
        Ok(principals.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, anyhow::Error> {
        let principals = self
            .principals
            .read()
            .map_err(|_| anyhow::anyhow!("principal store lock poisoned"))?;
        Ok(principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, anyhow::Error> {
        let principals = self
            .principals
            .read()
            .map_err(|_| anyhow::anyhow!("principal store lock poisoned"))?;
        Ok(principals
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn insert(&self, principal: Principal) -> Result<(), anyhow::Error> {
        let mut principals = self
            .principals
            .write()
            .map_err(|_| anyhow::anyhow!("principal store lock poisoned"))?;
        principals.insert(principal.id, principal);
        Ok(())
    }

    async fn update(&self, principal: Principal) -> Result<(), anyhow::Error> {
        let mut principals = self
            .principals
            .write()
            .map_err(|_| anyhow::anyhow!("principal store lock poisoned"))?;
        if !principals.contains_key(&principal.id) {
            return Err(anyhow::anyhow!("principal {} not found", principal.id));
        }
        principals.insert(principal.id, principal);
        Ok(())
    }
}
