//! RevocationStore (spec §4.3): at-most-once existence queries for access
//! token JTIs and refresh-token records. Follows the same trait-plus-
//! in-memory-double shape as `RefreshTokenStore`/`RevokedTokenStore` in
//! `token_service.rs`, generalized to the introspection pipeline's exact
//! contract.

use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub tenant_id: String,
    pub sub: String,
    pub rtv: u32,
    pub client_id: String,
    pub jti: String,
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_access_revoked(&self, jti: &str) -> Result<bool, AuthError>;
    async fn get_refresh(
        &self,
        sub: &str,
        rtv: u32,
        client_id: &str,
        jti: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;
    /// Adds a tombstone that persists at least until `ttl` has elapsed —
    /// callers pass the original token's remaining lifetime so the
    /// revocation record outlives the token it revokes.
    async fn revoke_access(&self, jti: &str, ttl: Duration) -> Result<(), AuthError>;
}

pub struct InMemoryRevocationStore {
    revoked: Arc<DashMap<String, DateTime<Utc>>>,
    refresh: Arc<DashMap<(String, u32, String, String), RefreshTokenRecord>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self {
            revoked: Arc::new(DashMap::new()),
            refresh: Arc::new(DashMap::new()),
        }
    }

    /// Test/seeding helper: register a live refresh token record.
    pub fn insert_refresh(&self, record: RefreshTokenRecord) {
        self.refresh.insert(
            (
                record.tenant_id.clone(),
                record.rtv,
                record.client_id.clone(),
                record.jti.clone(),
            ),
            record,
        );
    }
}

impl Default for InMemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn is_access_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        match self.revoked.get(jti) {
            Some(expiry) => Ok(*expiry > Utc::now()),
            None => Ok(false),
        }
    }

    async fn get_refresh(
        &self,
        sub: &str,
        rtv: u32,
        client_id: &str,
        jti: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self
            .refresh
            .get(&(sub.to_string(), rtv, client_id.to_string(), jti.to_string()))
            .map(|r| r.clone()))
    }

    async fn revoke_access(&self, jti: &str, ttl: Duration) -> Result<(), AuthError> {
        self.revoked.insert(jti.to_string(), Utc::now() + ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoke_then_query_returns_true() {
        let store = InMemoryRevocationStore::new();
        store.revoke_access("j1", Duration::hours(1)).await.unwrap();
        assert!(store.is_access_revoked("j1").await.unwrap());
        assert!(!store.is_access_revoked("j2").await.unwrap());
    }

    #[tokio::test]
    async fn refresh_lookup_is_keyed_by_all_four_fields() {
        let store = InMemoryRevocationStore::new();
        store.insert_refresh(RefreshTokenRecord {
            tenant_id: "u1".into(),
            sub: "u1".into(),
            rtv: 1,
            client_id: "c1".into(),
            jti: "j2".into(),
        });
        assert!(store.get_refresh("u1", 1, "c1", "j2").await.unwrap().is_some());
        assert!(store.get_refresh("u1", 2, "c1", "j2").await.unwrap().is_none());
    }
}
