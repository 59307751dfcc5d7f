//! Authoritative signing-key store backing `auth_crypto::KeyStore`.
//! Mirrors `user_repository.rs`'s raw `sqlx::query` + manual row mapping
//! style rather than the `query!` macro (key rows carry a JSON `public_jwk`
//! column the macro's compile-time checking doesn't handle cleanly here).

use auth_crypto::keystore::{KeyError, KeyRepository, KeyStatus, SigningKeyRecord};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

fn status_to_str(status: KeyStatus) -> &'static str {
    match status {
        KeyStatus::Active => "active",
        KeyStatus::Overlap => "overlap",
        KeyStatus::Revoked => "revoked",
    }
}

fn status_from_str(s: &str) -> KeyStatus {
    match s {
        "active" => KeyStatus::Active,
        "overlap" => KeyStatus::Overlap,
        _ => KeyStatus::Revoked,
    }
}

#[derive(Clone)]
pub struct SigningKeyRepository {
    pool: MySqlPool,
}

impl SigningKeyRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<SigningKeyRecord, KeyError> {
        let status_str: String = row
            .try_get("status")
            .map_err(|e| KeyError::LoadingError(e.to_string()))?;
        let public_jwk_str: String = row
            .try_get("public_jwk")
            .map_err(|e| KeyError::LoadingError(e.to_string()))?;
        Ok(SigningKeyRecord {
            kid: row.try_get("kid").map_err(|e| KeyError::LoadingError(e.to_string()))?,
            status: status_from_str(&status_str),
            public_pem: row
                .try_get("public_pem")
                .map_err(|e| KeyError::LoadingError(e.to_string()))?,
            private_pem: row
                .try_get("private_pem")
                .map_err(|e| KeyError::LoadingError(e.to_string()))?,
            public_jwk: serde_json::from_str(&public_jwk_str).unwrap_or(serde_json::json!({})),
            created_at: row
                .try_get("created_at")
                .map_err(|e| KeyError::LoadingError(e.to_string()))?,
        })
    }
}

#[async_trait::async_trait]
impl KeyRepository for SigningKeyRepository {
    async fn active_key(&self, tenant_id: Uuid) -> Result<Option<SigningKeyRecord>, KeyError> {
        let row = sqlx::query(
            "SELECT kid, status, public_pem, private_pem, public_jwk, created_at \
             FROM signing_keys WHERE tenant_id = ? AND status = 'active' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;

        row.map(|r| self.map_row(r)).transpose()
    }

    async fn find_by_kid(&self, tenant_id: Uuid, kid: &str) -> Result<Option<SigningKeyRecord>, KeyError> {
        let row = sqlx::query(
            "SELECT kid, status, public_pem, private_pem, public_jwk, created_at \
             FROM signing_keys WHERE tenant_id = ? AND kid = ?",
        )
        .bind(tenant_id.to_string())
        .bind(kid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;

        row.map(|r| self.map_row(r)).transpose()
    }

    async fn list_verifiable(&self, tenant_id: Uuid) -> Result<Vec<SigningKeyRecord>, KeyError> {
        let rows = sqlx::query(
            "SELECT kid, status, public_pem, private_pem, public_jwk, created_at \
             FROM signing_keys WHERE tenant_id = ? AND status IN ('active', 'overlap')",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;

        rows.into_iter().map(|r| self.map_row(r)).collect()
    }

    async fn insert(&self, tenant_id: Uuid, key: SigningKeyRecord) -> Result<(), KeyError> {
        sqlx::query(
            "INSERT INTO signing_keys (id, tenant_id, kid, status, public_pem, private_pem, public_jwk, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(tenant_id.to_string())
        .bind(&key.kid)
        .bind(status_to_str(key.status))
        .bind(&key.public_pem)
        .bind(&key.private_pem)
        .bind(serde_json::to_string(&key.public_jwk).unwrap_or_else(|_| "{}".to_string()))
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;
        Ok(())
    }

    async fn demote_active_to_overlap(&self, tenant_id: Uuid) -> Result<(), KeyError> {
        sqlx::query("UPDATE signing_keys SET status = 'overlap' WHERE tenant_id = ? AND status = 'active'")
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;
        Ok(())
    }

    async fn revoke_all_non_revoked(&self, tenant_id: Uuid) -> Result<(), KeyError> {
        sqlx::query("UPDATE signing_keys SET status = 'revoked' WHERE tenant_id = ? AND status != 'revoked'")
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| KeyError::StoreUnreachable(e.to_string()))?;
        Ok(())
    }
}
