//! OAuth/OIDC client registry backed by MySQL.

use auth_core::error::AuthError;
use auth_core::models::client::{Client, ClientAuthMethod};
use auth_core::services::client_registry::ClientStore;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct ClientRepository {
    pool: MySqlPool,
}

impl ClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> Result<Client, AuthError> {
        let tenant_id_str: String = row.try_get("tenant_id").map_err(AuthError::from)?;
        let auth_methods_str: String = row.try_get("allowed_auth_methods").map_err(AuthError::from)?;
        let allowed_auth_methods: Vec<ClientAuthMethod> =
            serde_json::from_str(&auth_methods_str).unwrap_or_default();
        let public_keys_str: Option<String> = row.try_get("public_keys").map_err(AuthError::from)?;
        let policy_flags_str: String = row
            .try_get("policy_flags")
            .unwrap_or_else(|_| "{}".to_string());

        Ok(Client {
            client_id: row.try_get("client_id").map_err(AuthError::from)?,
            tenant_id: Uuid::parse_str(&tenant_id_str).unwrap_or_default(),
            secret_hash: row.try_get("secret_hash").map_err(AuthError::from)?,
            allowed_auth_methods,
            public_keys: public_keys_str.and_then(|s| serde_json::from_str(&s).ok()),
            signed_response_alg: row.try_get("signed_response_alg").map_err(AuthError::from)?,
            encrypted_response_alg: row.try_get("encrypted_response_alg").map_err(AuthError::from)?,
            encrypted_response_enc: row.try_get("encrypted_response_enc").map_err(AuthError::from)?,
            allow_claims_without_scope: row
                .try_get::<i8, _>("allow_claims_without_scope")
                .map(|v| v != 0)
                .unwrap_or(false),
            policy_flags: serde_json::from_str(&policy_flags_str).unwrap_or(serde_json::json!({})),
        })
    }
}

#[async_trait::async_trait]
impl ClientStore for ClientRepository {
    async fn find_by_id(&self, tenant_id: Uuid, client_id: &str) -> Result<Option<Client>, AuthError> {
        let row = sqlx::query(
            "SELECT client_id, tenant_id, secret_hash, allowed_auth_methods, public_keys, \
             signed_response_alg, encrypted_response_alg, encrypted_response_enc, \
             allow_claims_without_scope, policy_flags \
             FROM oauth_clients WHERE tenant_id = ? AND client_id = ?",
        )
        .bind(tenant_id.to_string())
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::from)?;

        row.map(|r| self.map_row(r)).transpose()
    }

    async fn upsert(&self, client: Client) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO oauth_clients (client_id, tenant_id, secret_hash, allowed_auth_methods, \
             public_keys, signed_response_alg, encrypted_response_alg, encrypted_response_enc, \
             allow_claims_without_scope, policy_flags) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE secret_hash = VALUES(secret_hash), \
             allowed_auth_methods = VALUES(allowed_auth_methods), public_keys = VALUES(public_keys), \
             signed_response_alg = VALUES(signed_response_alg), \
             encrypted_response_alg = VALUES(encrypted_response_alg), \
             encrypted_response_enc = VALUES(encrypted_response_enc), \
             allow_claims_without_scope = VALUES(allow_claims_without_scope), \
             policy_flags = VALUES(policy_flags)",
        )
        .bind(&client.client_id)
        .bind(client.tenant_id.to_string())
        .bind(&client.secret_hash)
        .bind(serde_json::to_string(&client.allowed_auth_methods).unwrap_or_else(|_| "[]".into()))
        .bind(client.public_keys.as_ref().map(|v| v.to_string()))
        .bind(&client.signed_response_alg)
        .bind(&client.encrypted_response_alg)
        .bind(&client.encrypted_response_enc)
        .bind(client.allow_claims_without_scope)
        .bind(client.policy_flags.to_string())
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }
}
