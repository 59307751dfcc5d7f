//! MySQL-backed `ApiKeyStore` for the check-API authentication layer.

use auth_core::error::AuthError;
use auth_core::models::rebac::ApiKey;
use auth_core::services::check_service::ApiKeyStore;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: MySqlPool,
}

impl ApiKeyRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<ApiKey, AuthError> {
        let id_str: String = row.try_get("id").map_err(AuthError::from)?;
        let tenant_id_str: String = row.try_get("tenant_id").map_err(AuthError::from)?;
        let allowed_operations_str: String =
            row.try_get("allowed_operations").map_err(AuthError::from)?;

        Ok(ApiKey {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            tenant_id: Uuid::parse_str(&tenant_id_str).unwrap_or_default(),
            client_id: row.try_get("client_id").map_err(AuthError::from)?,
            name: row.try_get("name").map_err(AuthError::from)?,
            key_prefix: row.try_get("key_prefix").map_err(AuthError::from)?,
            key_hash: row.try_get("key_hash").map_err(AuthError::from)?,
            allowed_operations: sqlx::types::Json(
                serde_json::from_str(&allowed_operations_str).unwrap_or_default(),
            ),
            rate_limit_tier: row.try_get("rate_limit_tier").map_err(AuthError::from)?,
            is_active: row.try_get::<i8, _>("is_active").map(|v| v != 0).map_err(AuthError::from)?,
            expires_at: row.try_get("expires_at").ok(),
        })
    }
}

#[async_trait::async_trait]
impl ApiKeyStore for ApiKeyRepository {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, client_id, name, key_prefix, key_hash, allowed_operations, \
             rate_limit_tier, is_active, expires_at FROM api_keys WHERE key_hash = ?",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?;

        row.map(|r| self.map_row(r)).transpose()
    }
}
