//! Hierarchical signing-key lifecycle and JWKS view (spec §4.2).
//!
//! Three lookup tiers sit in front of the authoritative store:
//! process-local (short TTL, no lock contention across requests beyond a
//! read lock) → shared tenant-wide (shorter TTL, stands in for a
//! distributed cache tier without introducing a new external dependency) →
//! authoritative `KeyRepository`. Rotation writes flow the other way:
//! authoritative first, then both cache tiers are invalidated before the
//! call returns.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    GenerationError(String),
    #[error("Key loading failed: {0}")]
    LoadingError(String),
    #[error("Invalid key format: {0}")]
    InvalidFormat(String),
    #[error("Authoritative key store unreachable: {0}")]
    StoreUnreachable(String),
    #[error("Emergency rotation reason must be at least 10 characters")]
    ReasonTooShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Overlap,
    Revoked,
}

/// A signing key as held by the authoritative store. `private_pem` is
/// `None` once a key has no further signing use (e.g. reconstructed purely
/// for JWKS display); `KeyStore::rotate` always produces one with both
/// halves present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKeyRecord {
    pub kid: String,
    pub status: KeyStatus,
    pub public_pem: String,
    pub private_pem: Option<String>,
    pub public_jwk: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SigningKeyRecord {
    pub fn is_verifiable(&self) -> bool {
        matches!(self.status, KeyStatus::Active | KeyStatus::Overlap)
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, KeyError> {
        DecodingKey::from_rsa_pem(self.public_pem.as_bytes())
            .map_err(|e| KeyError::LoadingError(e.to_string()))
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, KeyError> {
        let pem = self
            .private_pem
            .as_deref()
            .ok_or_else(|| KeyError::LoadingError("no private key material".into()))?;
        EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| KeyError::LoadingError(e.to_string()))
    }
}

/// Authoritative persistence for signing keys, implemented by
/// `auth-db`'s `KeyRepository` (MySQL) with an in-memory double for tests,
/// mirroring the `RefreshTokenStore`/`RevokedTokenStore` trait-plus-double
/// pattern used elsewhere in this workspace.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn active_key(&self, tenant_id: Uuid) -> Result<Option<SigningKeyRecord>, KeyError>;
    async fn find_by_kid(
        &self,
        tenant_id: Uuid,
        kid: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyError>;
    async fn list_verifiable(&self, tenant_id: Uuid) -> Result<Vec<SigningKeyRecord>, KeyError>;
    async fn insert(&self, tenant_id: Uuid, key: SigningKeyRecord) -> Result<(), KeyError>;
    async fn demote_active_to_overlap(&self, tenant_id: Uuid) -> Result<(), KeyError>;
    async fn revoke_all_non_revoked(&self, tenant_id: Uuid) -> Result<(), KeyError>;
}

pub struct InMemoryKeyRepository {
    keys: DashMap<Uuid, Vec<SigningKeyRecord>>,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self { keys: DashMap::new() }
    }
}

impl Default for InMemoryKeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyRepository for InMemoryKeyRepository {
    async fn active_key(&self, tenant_id: Uuid) -> Result<Option<SigningKeyRecord>, KeyError> {
        Ok(self
            .keys
            .get(&tenant_id)
            .and_then(|list| list.iter().find(|k| k.status == KeyStatus::Active).cloned()))
    }

    async fn find_by_kid(
        &self,
        tenant_id: Uuid,
        kid: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyError> {
        Ok(self
            .keys
            .get(&tenant_id)
            .and_then(|list| list.iter().find(|k| k.kid == kid).cloned()))
    }

    async fn list_verifiable(&self, tenant_id: Uuid) -> Result<Vec<SigningKeyRecord>, KeyError> {
        Ok(self
            .keys
            .get(&tenant_id)
            .map(|list| list.iter().filter(|k| k.is_verifiable()).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, tenant_id: Uuid, key: SigningKeyRecord) -> Result<(), KeyError> {
        self.keys.entry(tenant_id).or_default().push(key);
        Ok(())
    }

    async fn demote_active_to_overlap(&self, tenant_id: Uuid) -> Result<(), KeyError> {
        if let Some(mut list) = self.keys.get_mut(&tenant_id) {
            for key in list.iter_mut() {
                if key.status == KeyStatus::Active {
                    key.status = KeyStatus::Overlap;
                }
            }
        }
        Ok(())
    }

    async fn revoke_all_non_revoked(&self, tenant_id: Uuid) -> Result<(), KeyError> {
        if let Some(mut list) = self.keys.get_mut(&tenant_id) {
            for key in list.iter_mut() {
                key.status = KeyStatus::Revoked;
            }
        }
        Ok(())
    }
}

struct TieredCache {
    ttl: Duration,
    entries: DashMap<Uuid, (Instant, Vec<SigningKeyRecord>)>,
}

impl TieredCache {
    fn new(ttl: Duration) -> Self {
        Self { ttl, entries: DashMap::new() }
    }

    fn get(&self, tenant_id: Uuid) -> Option<Vec<SigningKeyRecord>> {
        let entry = self.entries.get(&tenant_id)?;
        let (written_at, keys) = &*entry;
        if written_at.elapsed() > self.ttl {
            None
        } else {
            Some(keys.clone())
        }
    }

    fn put(&self, tenant_id: Uuid, keys: Vec<SigningKeyRecord>) {
        self.entries.insert(tenant_id, (Instant::now(), keys));
    }

    fn invalidate(&self, tenant_id: Uuid) {
        self.entries.remove(&tenant_id);
    }
}

/// Default retention window for demoted (`overlap`) keys.
pub const DEFAULT_OVERLAP_RETENTION: ChronoDuration = ChronoDuration::hours(24);

pub struct KeyStore {
    repository: Arc<dyn KeyRepository>,
    process_local: TieredCache,
    shared: TieredCache,
    /// Serializes `rotate`/`emergency_rotate` per the "emergency rotation is
    /// the one serialized region" rule in §5.
    rotation_lock: Mutex<()>,
}

impl KeyStore {
    pub fn new(repository: Arc<dyn KeyRepository>) -> Self {
        Self {
            repository,
            process_local: TieredCache::new(Duration::from_secs(300)),
            shared: TieredCache::new(Duration::from_secs(60)),
            rotation_lock: Mutex::new(()),
        }
    }

    /// Three-tier lookup per §4.2. Returns `None` on a miss at all tiers
    /// (never an error) unless the authoritative store itself errors, which
    /// is surfaced so the caller can map it to a 500 `server_error`.
    pub async fn get_key_by_kid(
        &self,
        tenant_id: Uuid,
        kid: Option<&str>,
    ) -> Result<Option<SigningKeyRecord>, KeyError> {
        let kid = match kid {
            Some(k) => k,
            None => return Ok(None),
        };

        if let Some(keys) = self.process_local.get(tenant_id) {
            if let Some(found) = keys.into_iter().find(|k| k.kid == kid) {
                return Ok(Some(found));
            }
        }

        if let Some(keys) = self.shared.get(tenant_id) {
            self.process_local.put(tenant_id, keys.clone());
            if let Some(found) = keys.into_iter().find(|k| k.kid == kid) {
                return Ok(Some(found));
            }
        }

        match self.repository.list_verifiable(tenant_id).await {
            Ok(keys) => {
                self.shared.put(tenant_id, keys.clone());
                self.process_local.put(tenant_id, keys.clone());
                Ok(keys.into_iter().find(|k| k.kid == kid))
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e, "authoritative key store unreachable, serving stale cache if any");
                Err(e)
            }
        }
    }

    pub async fn jwks(&self, tenant_id: Uuid) -> Result<serde_json::Value, KeyError> {
        let keys = self.repository.list_verifiable(tenant_id).await?;
        Ok(serde_json::json!({
            "keys": keys.into_iter().map(|k| k.public_jwk).collect::<Vec<_>>()
        }))
    }

    /// Promote a freshly generated key to `active`, demoting the prior
    /// active key to `overlap`. Rotations fail closed: any repository error
    /// is propagated rather than silently skipped.
    pub async fn rotate(&self, tenant_id: Uuid, new_key: SigningKeyRecord) -> Result<(), KeyError> {
        let _guard = self.rotation_lock.lock().await;
        self.repository.demote_active_to_overlap(tenant_id).await?;
        self.repository.insert(tenant_id, new_key).await?;
        self.process_local.invalidate(tenant_id);
        self.shared.invalidate(tenant_id);
        Ok(())
    }

    /// Immediately revoke the prior active key and all overlap keys, then
    /// promote `new_key`. `reason` must be at least 10 characters (spec
    /// §4.2). All cache tiers are invalidated before returning.
    pub async fn emergency_rotate(
        &self,
        tenant_id: Uuid,
        reason: &str,
        new_key: SigningKeyRecord,
    ) -> Result<(), KeyError> {
        if reason.len() < 10 {
            return Err(KeyError::ReasonTooShort);
        }
        let _guard = self.rotation_lock.lock().await;
        tracing::warn!(tenant_id = %tenant_id, reason, "emergency key rotation");
        self.repository.revoke_all_non_revoked(tenant_id).await?;
        self.repository.insert(tenant_id, new_key).await?;
        self.process_local.invalidate(tenant_id);
        self.shared.invalidate(tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(kid: &str, status: KeyStatus) -> SigningKeyRecord {
        SigningKeyRecord {
            kid: kid.to_string(),
            status,
            public_pem: include_str!("../test_keys/public_key.pem").to_string(),
            private_pem: Some(include_str!("../test_keys/private_key.pem").to_string()),
            public_jwk: serde_json::json!({"kid": kid, "kty": "RSA"}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rotate_demotes_prior_active_and_is_visible_immediately() {
        let repo = Arc::new(InMemoryKeyRepository::new());
        let store = KeyStore::new(repo.clone());
        let tenant = Uuid::new_v4();

        repo.insert(tenant, test_key("k1", KeyStatus::Active)).await.unwrap();
        store.rotate(tenant, test_key("k2", KeyStatus::Active)).await.unwrap();

        let k1 = store.get_key_by_kid(tenant, Some("k1")).await.unwrap().unwrap();
        assert_eq!(k1.status, KeyStatus::Overlap);
        let k2 = store.get_key_by_kid(tenant, Some("k2")).await.unwrap().unwrap();
        assert_eq!(k2.status, KeyStatus::Active);
    }

    #[tokio::test]
    async fn emergency_rotate_rejects_short_reason() {
        let repo = Arc::new(InMemoryKeyRepository::new());
        let store = KeyStore::new(repo);
        let err = store
            .emergency_rotate(Uuid::new_v4(), "too short", test_key("k3", KeyStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyError::ReasonTooShort));
    }

    #[tokio::test]
    async fn emergency_rotate_revokes_overlap_keys() {
        let repo = Arc::new(InMemoryKeyRepository::new());
        let store = KeyStore::new(repo.clone());
        let tenant = Uuid::new_v4();
        repo.insert(tenant, test_key("k1", KeyStatus::Overlap)).await.unwrap();
        repo.insert(tenant, test_key("k2", KeyStatus::Active)).await.unwrap();

        store
            .emergency_rotate(tenant, "compromised signing key material", test_key("k3", KeyStatus::Active))
            .await
            .unwrap();

        assert!(store.get_key_by_kid(tenant, Some("k1")).await.unwrap().is_none());
        assert!(store.get_key_by_kid(tenant, Some("k2")).await.unwrap().is_none());
        assert!(store.get_key_by_kid(tenant, Some("k3")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_kid_returns_none_not_error() {
        let repo = Arc::new(InMemoryKeyRepository::new());
        let store = KeyStore::new(repo);
        assert!(store.get_key_by_kid(Uuid::new_v4(), Some("missing")).await.unwrap().is_none());
    }
}
