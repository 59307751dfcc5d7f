use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T>;
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// L1 (process-local) + L2 (shared Redis) cache. `l2` is absent when no Redis
/// URL is configured; operations silently degrade to L1-only rather than
/// failing, matching how startup falls back when Redis is unreachable.
pub struct MultiLevelCache {
    l1: DashMap<String, (String, std::time::Instant)>,
    l2: Option<Client>,
}

impl MultiLevelCache {
    pub fn new(redis_url: Option<&str>) -> anyhow::Result<Self> {
        let l2 = match redis_url {
            Some(url) => Some(Client::open(url)?),
            None => None,
        };
        Ok(Self {
            l1: DashMap::new(),
            l2,
        })
    }

    // Used for L1 invalidation simulation in tests
    pub fn invalidate_l1(&self, key: &str) {
        self.l1.remove(key);
    }
}

impl MultiLevelCache {
    pub async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.l1.get(key) {
            if entry.1 > std::time::Instant::now() {
                debug!("L1 Cache Hit: {}", key);
                if let Ok(val) = serde_json::from_str(&entry.0) {
                    return Some(val);
                }
            } else {
                drop(entry);
                self.l1.remove(key);
            }
        }

        let client = self.l2.as_ref()?;
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Redis connection error: {}", e);
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(val_str)) => {
                debug!("L2 Cache Hit: {}", key);
                self.l1.insert(key.to_string(), (val_str.clone(), std::time::Instant::now() + Duration::from_secs(60)));
                serde_json::from_str(&val_str).ok()
            }
            Ok(None) => None,
            Err(e) => {
                error!("Redis get error: {}", e);
                None
            }
        }
    }

    pub async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        let val_str = serde_json::to_string(value)?;
        self.l1.insert(key.to_string(), (val_str.clone(), std::time::Instant::now() + ttl));

        let Some(client) = self.l2.as_ref() else {
            return Ok(());
        };
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, val_str, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.l1.remove(key);
        let Some(client) = self.l2.as_ref() else {
            return Ok(());
        };
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for MultiLevelCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        MultiLevelCache::get(self, key).await
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        MultiLevelCache::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        MultiLevelCache::delete(self, key).await
    }
}

/// Tenant-scoped front end over `MultiLevelCache` with the exact key formats
/// the introspection, ReBAC and API-key-check paths require.
pub struct RequestCache {
    inner: MultiLevelCache,
}

impl RequestCache {
    pub fn new(inner: MultiLevelCache) -> Self {
        Self { inner }
    }

    fn hex_sha256(input: &str) -> String {
        let digest = Sha256::digest(input.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn introspection_key(jti: &str) -> String {
        format!("introspect_cache:{}", Self::hex_sha256(jti))
    }

    pub fn rebac_key(
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> String {
        format!("rebac:{tenant_id}:{user_type}:{user_id}:{object_type}:{object_id}:{relation}")
    }

    pub fn check_api_key(key_material: &str) -> String {
        format!("check:apikey:{}", Self::hex_sha256(key_material))
    }

    pub async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        self.inner.get(key).await
    }

    pub async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        self.inner.set(key, value, ttl).await
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.inner.delete(key).await {
            warn!("cache delete failed for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_cache_keys_are_stable_and_namespaced() {
        let a = RequestCache::introspection_key("jti-1");
        let b = RequestCache::introspection_key("jti-1");
        let c = RequestCache::introspection_key("jti-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("introspect_cache:"));

        let k = RequestCache::check_api_key("secret-key-material");
        assert!(k.starts_with("check:apikey:"));
    }

    #[tokio::test]
    async fn l1_only_cache_roundtrips_without_redis() {
        let cache = MultiLevelCache::new(None).unwrap();
        cache.set("k", &"v".to_string(), Duration::from_secs(5)).await.unwrap();
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, Some("v".to_string()));

        cache.delete("k").await.unwrap();
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn l1_entry_expires_after_ttl() {
        let cache = MultiLevelCache::new(None).unwrap();
        cache.set("k", &"v".to_string(), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let got: Option<String> = cache.get("k").await;
        assert_eq!(got, None);
    }
}
