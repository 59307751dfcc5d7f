//! MySQL-backed `RelationshipStore` for the ReBAC tuple graph.

use auth_core::error::AuthError;
use auth_core::models::rebac::RelationshipTuple;
use auth_core::services::rebac::RelationshipStore;
use chrono::Utc;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct RebacRepository {
    pool: MySqlPool,
}

impl RebacRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn map_row(&self, row: sqlx::mysql::MySqlRow) -> RelationshipTuple {
        let tenant_id_str: String = row.try_get("tenant_id").unwrap_or_default();
        RelationshipTuple {
            tenant_id: Uuid::parse_str(&tenant_id_str).unwrap_or_default(),
            from_type: row.try_get("from_type").unwrap_or_default(),
            from_id: row.try_get("from_id").unwrap_or_default(),
            to_type: row.try_get("to_type").unwrap_or_default(),
            to_id: row.try_get("to_id").unwrap_or_default(),
            relation: row.try_get("relation").unwrap_or_default(),
            expires_at: row.try_get("expires_at").ok(),
            bidirectional: row.try_get::<i8, _>("bidirectional").map(|v| v != 0).unwrap_or(false),
        }
    }
}

#[async_trait::async_trait]
impl RelationshipStore for RebacRepository {
    async fn has_direct(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool, AuthError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM relationship_tuples \
             WHERE tenant_id = ? AND from_type = ? AND from_id = ? AND to_type = ? AND to_id = ? \
             AND relation = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(tenant_id.to_string())
        .bind(user_type)
        .bind(user_id)
        .bind(object_type)
        .bind(object_id)
        .bind(relation)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(AuthError::from)?;
        let count: i64 = row.try_get("count").map_err(AuthError::from)?;
        Ok(count > 0)
    }

    async fn usersets_for(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        tupleset_relation: &str,
    ) -> Result<Vec<RelationshipTuple>, AuthError> {
        let rows = sqlx::query(
            "SELECT tenant_id, from_type, from_id, to_type, to_id, relation, expires_at, bidirectional \
             FROM relationship_tuples \
             WHERE tenant_id = ? AND to_type = ? AND to_id = ? AND relation = ? \
             AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(tenant_id.to_string())
        .bind(object_type)
        .bind(object_id)
        .bind(tupleset_relation)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(rows.into_iter().map(|r| self.map_row(r)).collect())
    }

    async fn write(&self, tuple: RelationshipTuple) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO relationship_tuples \
             (tenant_id, from_type, from_id, to_type, to_id, relation, expires_at, bidirectional) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE expires_at = VALUES(expires_at), bidirectional = VALUES(bidirectional)",
        )
        .bind(tuple.tenant_id.to_string())
        .bind(&tuple.from_type)
        .bind(&tuple.from_id)
        .bind(&tuple.to_type)
        .bind(&tuple.to_id)
        .bind(&tuple.relation)
        .bind(tuple.expires_at)
        .bind(tuple.bidirectional)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        from_type: &str,
        from_id: &str,
        to_type: &str,
        to_id: &str,
        relation: &str,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "DELETE FROM relationship_tuples \
             WHERE tenant_id = ? AND from_type = ? AND from_id = ? AND to_type = ? AND to_id = ? AND relation = ?",
        )
        .bind(tenant_id.to_string())
        .bind(from_type)
        .bind(from_id)
        .bind(to_type)
        .bind(to_id)
        .bind(relation)
        .execute(&self.pool)
        .await
        .map_err(AuthError::from)?;
        Ok(())
    }

    async fn objects_for_subject(
        &self,
        tenant_id: Uuid,
        user_type: &str,
        user_id: &str,
        object_type: &str,
        relation: &str,
    ) -> Result<Vec<String>, AuthError> {
        let rows = sqlx::query(
            "SELECT to_id FROM relationship_tuples \
             WHERE tenant_id = ? AND from_type = ? AND from_id = ? AND to_type = ? AND relation = ? \
             AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(tenant_id.to_string())
        .bind(user_type)
        .bind(user_id)
        .bind(object_type)
        .bind(relation)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(AuthError::from)?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("to_id").map_err(AuthError::from))
            .collect()
    }

    async fn subjects_for_object(
        &self,
        tenant_id: Uuid,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<Vec<(String, String)>, AuthError> {
        let rows = sqlx::query(
            "SELECT from_type, from_id FROM relationship_tuples \
             WHERE tenant_id = ? AND to_type = ? AND to_id = ? AND relation = ? \
             AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(tenant_id.to_string())
        .bind(object_type)
        .bind(object_id)
        .bind(relation)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(AuthError::from)?;
        rows.into_iter()
            .map(|r| {
                let from_type: String = r.try_get("from_type").map_err(AuthError::from)?;
                let from_id: String = r.try_get("from_id").map_err(AuthError::from)?;
                Ok((from_type, from_id))
            })
            .collect()
    }
}
