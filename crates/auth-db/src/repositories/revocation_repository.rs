//! MySQL-backed `RevocationStore`, generalizing `revoked_token_repository.rs`
//! and `refresh_token_repository.rs`'s table shapes into the single
//! (jti-tombstone, refresh-record-existence) contract the introspection
//! pipeline needs.

use auth_core::error::AuthError;
use auth_core::services::revocation::{RefreshTokenRecord, RevocationStore};
use chrono::{Duration, Utc};
use sqlx::{MySqlPool, Row};

#[derive(Clone)]
pub struct RevocationRepository {
    pool: MySqlPool,
}

impl RevocationRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RevocationStore for RevocationRepository {
    async fn is_access_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM revoked_tokens WHERE token_jti = ? AND expires_at > ?",
        )
        .bind(jti)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(AuthError::from)?;
        let count: i64 = row.try_get("count").map_err(AuthError::from)?;
        Ok(count > 0)
    }

    async fn get_refresh(
        &self,
        sub: &str,
        rtv: u32,
        client_id: &str,
        jti: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query(
            "SELECT tenant_id, user_id, rtv, client_id, jti FROM refresh_tokens \
             WHERE user_id = ? AND rtv = ? AND client_id = ? AND jti = ? AND revoked_at IS NULL \
             AND expires_at > ?",
        )
        .bind(sub)
        .bind(rtv)
        .bind(client_id)
        .bind(jti)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?;

        Ok(row.map(|r| RefreshTokenRecord {
            tenant_id: r.try_get::<String, _>("tenant_id").unwrap_or_default(),
            sub: r.try_get::<String, _>("user_id").unwrap_or_default(),
            rtv: r.try_get::<i64, _>("rtv").unwrap_or(1) as u32,
            client_id: r.try_get::<String, _>("client_id").unwrap_or_default(),
            jti: r.try_get::<String, _>("jti").unwrap_or_default(),
        }))
    }

    async fn revoke_access(&self, jti: &str, ttl: Duration) -> Result<(), AuthError> {
        let expires_at = Utc::now() + ttl;
        sqlx::query(
            "INSERT INTO revoked_tokens (id, token_jti, user_id, tenant_id, token_type, revoked_at, expires_at) \
             VALUES (?, ?, '', '', 'access', ?, ?) \
             ON DUPLICATE KEY UPDATE expires_at = VALUES(expires_at)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(jti)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }
}
