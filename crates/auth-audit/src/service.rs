use anyhow::Result;
use auth_core::audit::{AuditEvent, AuditLogger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, MySqlPool};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: String, // CHAR(36) in DB
    pub action: String,
    pub actor_id: String, // CHAR(36) in DB
    pub resource: String,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    pub prev_hash: String,
}

impl AuditLog {
    fn content(prev_hash: &str, id: &str, action: &str, actor_id: &str, resource: &str, timestamp: DateTime<Utc>) -> String {
        format!("{}{}{}{}{}{}", prev_hash, id, action, actor_id, resource, timestamp.to_rfc3339())
    }

    fn recompute_hash(&self) -> String {
        let content = Self::content(&self.prev_hash, &self.id, &self.action, &self.actor_id, &self.resource, self.timestamp);
        format!("{:x}", Sha256::digest(content.as_bytes()))
    }
}

/// Tamper-evident audit log: each row hashes its own content together with
/// the previous row's hash, so altering or deleting a row breaks the chain
/// for every row after it.
#[derive(Debug, Clone)]
pub struct AuditService {
    pool: MySqlPool,
}

impl AuditService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn export_cef(&self, log: &AuditLog) -> String {
        // CEF:Version|Device Vendor|Device Product|Device Version|Device Event Class ID|Name|Severity|[Extension]
        format!(
            "CEF:0|AuthPlatform|SSO|1.0|{}|{}|5|act={} msg={}",
            log.action, log.action, log.actor_id, log.resource
        )
    }

    pub async fn log(
        &self,
        action: &str,
        actor_id: Uuid,
        resource: &str,
        metadata: Option<Value>,
    ) -> Result<AuditLog> {
        let prev_log = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY timestamp DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let prev_hash = prev_log.map(|l| l.hash).unwrap_or_else(|| "0".repeat(64));

        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let id_str = id.to_string();
        let actor_id_str = actor_id.to_string();

        let content = AuditLog::content(&prev_hash, &id_str, action, &actor_id_str, resource, timestamp);
        let hash = format!("{:x}", Sha256::digest(content.as_bytes()));

        let audit_log = AuditLog {
            id: id_str,
            action: action.to_string(),
            actor_id: actor_id_str,
            resource: resource.to_string(),
            metadata: metadata.clone(),
            timestamp,
            hash,
            prev_hash,
        };

        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, action, actor_id, resource, metadata, timestamp, hash, prev_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(&audit_log.id)
        .bind(&audit_log.action)
        .bind(&audit_log.actor_id)
        .bind(&audit_log.resource)
        .bind(&audit_log.metadata)
        .bind(audit_log.timestamp)
        .bind(&audit_log.hash)
        .bind(&audit_log.prev_hash)
        .execute(&self.pool)
        .await?;

        info!("Audit log created: {} - {}", action, id);

        Ok(audit_log)
    }

    /// Walks the chain in timestamp order, recomputing each row's hash and
    /// checking it against the stored value and against the next row's
    /// `prev_hash`. Returns at the first row that fails either check.
    pub async fn verify_chain(&self) -> Result<bool> {
        let logs = sqlx::query_as::<_, AuditLog>("SELECT * FROM audit_logs ORDER BY timestamp ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut expected_prev_hash = "0".repeat(64);
        for log in &logs {
            if log.prev_hash != expected_prev_hash {
                error!(audit_id = %log.id, "audit chain broken: prev_hash mismatch");
                return Ok(false);
            }
            if log.recompute_hash() != log.hash {
                error!(audit_id = %log.id, "audit chain broken: hash mismatch");
                return Ok(false);
            }
            expected_prev_hash = log.hash.clone();
        }

        Ok(true)
    }
}

/// `AuditLogger` adapter so the tamper-evident chain can sit behind
/// `BroadcastAuditLogger` next to `TracingAuditLogger` and the webhook
/// transport.
#[async_trait::async_trait]
impl AuditLogger for AuditService {
    async fn log(&self, event: AuditEvent) {
        let actor_id = event.actor_id.unwrap_or_else(Uuid::nil);
        let resource = event.resource_id.as_deref().unwrap_or("");
        if let Err(e) = self
            .log(&event.action, actor_id, resource, Some(event.metadata))
            .await
        {
            error!("failed to persist tamper-evident audit log for {}: {}", event.action, e);
        }
    }
}
