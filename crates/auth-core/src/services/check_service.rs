//! UnifiedCheckService (spec §4.8): fuses explicit deny rules, ReBAC, and
//! role/attribute-level checks into one deny-wins decision. Grounded on the
//! `AuthorizationProvider`/`AuthzContext`/`AuthzDecision` shape in
//! `authorization.rs`, generalized with an extra ReBAC axis ahead of it.

use crate::error::AuthError;
use crate::models::rebac::{ApiKey, ApiKeyOperation, EvaluationContext, RelationExpression};
use crate::services::authorization::{AuthorizationProvider, AuthzContext};
use crate::services::rebac::ReBACEvaluator;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAxis {
    ExplicitDeny,
    Rebac,
    RoleAttribute,
    Default,
}

impl CheckAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckAxis::ExplicitDeny => "explicit_deny",
            CheckAxis::Rebac => "rebac",
            CheckAxis::RoleAttribute => "role_attribute",
            CheckAxis::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebacCheckRequest {
    pub relation: String,
    pub object_type: String,
    pub object_id: String,
    pub expression: RelationExpression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub subject: String,
    pub subject_type: String,
    pub permission: String,
    pub tenant_id: Uuid,
    #[serde(default = "serde_json::Value::default")]
    pub resource_context: serde_json::Value,
    #[serde(default)]
    pub rebac: Option<RebacCheckRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckDecision {
    pub allowed: bool,
    pub resolved_via: Vec<String>,
    pub final_decision: &'static str,
    pub cache_ttl: Option<u64>,
}

/// Explicit per-tenant deny list, checked before every other axis. Entries
/// are `(subject, permission)` pairs.
#[async_trait]
pub trait DenyRuleStore: Send + Sync {
    async fn is_denied(&self, tenant_id: Uuid, subject: &str, permission: &str) -> Result<bool, AuthError>;
}

pub struct InMemoryDenyRuleStore {
    denied: DashSet<(Uuid, String, String)>,
}

impl InMemoryDenyRuleStore {
    pub fn new() -> Self {
        Self {
            denied: DashSet::new(),
        }
    }

    pub fn deny(&self, tenant_id: Uuid, subject: impl Into<String>, permission: impl Into<String>) {
        self.denied.insert((tenant_id, subject.into(), permission.into()));
    }
}

impl Default for InMemoryDenyRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DenyRuleStore for InMemoryDenyRuleStore {
    async fn is_denied(&self, tenant_id: Uuid, subject: &str, permission: &str) -> Result<bool, AuthError> {
        Ok(self
            .denied
            .contains(&(tenant_id, subject.to_string(), permission.to_string())))
    }
}

/// Lookup for the `check_api` authentication layer (spec §6): callers present
/// a `sk_<prefix>_<secret>`-shaped key, the handler hashes the secret and
/// resolves it to an `ApiKey` record here before the permission check runs.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError>;
}

pub struct InMemoryApiKeyStore {
    keys: DashMap<String, ApiKey>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self { keys: DashMap::new() }
    }

    pub fn insert(&self, key: ApiKey) {
        self.keys.insert(key.key_hash.clone(), key);
    }
}

impl Default for InMemoryApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AuthError> {
        Ok(self.keys.get(key_hash).map(|e| e.value().clone()))
    }
}

/// Validates a presented API key against its store record: active, not
/// expired, and permitted to perform `operation`.
pub fn api_key_permits(key: &ApiKey, operation: ApiKeyOperation) -> bool {
    if !key.is_active {
        return false;
    }
    if let Some(expires_at) = key.expires_at {
        if expires_at <= chrono::Utc::now() {
            return false;
        }
    }
    key.allowed_operations.0.contains(&operation)
}

pub struct UnifiedCheckService {
    deny_rules: Arc<dyn DenyRuleStore>,
    rebac: Arc<ReBACEvaluator>,
    authorization: Arc<dyn AuthorizationProvider>,
    rebac_max_depth: u32,
    batch_size_limit: usize,
}

impl UnifiedCheckService {
    pub fn new(
        deny_rules: Arc<dyn DenyRuleStore>,
        rebac: Arc<ReBACEvaluator>,
        authorization: Arc<dyn AuthorizationProvider>,
        rebac_max_depth: u32,
        batch_size_limit: usize,
    ) -> Self {
        Self {
            deny_rules,
            rebac,
            authorization,
            rebac_max_depth,
            batch_size_limit,
        }
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<CheckDecision, AuthError> {
        let mut resolved_via = Vec::new();

        if self
            .deny_rules
            .is_denied(request.tenant_id, &request.subject, &request.permission)
            .await?
        {
            resolved_via.push(CheckAxis::ExplicitDeny.as_str().to_string());
            metrics::counter!("check_api_decisions", "axis" => "explicit_deny", "result" => "deny").increment(1);
            return Ok(CheckDecision {
                allowed: false,
                resolved_via,
                final_decision: "deny",
                cache_ttl: None,
            });
        }

        if let Some(rebac_req) = &request.rebac {
            let ctx = EvaluationContext::new(
                request.tenant_id,
                request.subject_type.clone(),
                request.subject.clone(),
                rebac_req.object_type.clone(),
                rebac_req.object_id.clone(),
                self.rebac_max_depth,
            );
            let allowed = self
                .rebac
                .check(&rebac_req.expression, &rebac_req.relation, ctx)
                .await?;
            resolved_via.push(CheckAxis::Rebac.as_str().to_string());
            if allowed {
                metrics::counter!("check_api_decisions", "axis" => "rebac", "result" => "allow").increment(1);
                return Ok(CheckDecision {
                    allowed: true,
                    resolved_via,
                    final_decision: "allow",
                    cache_ttl: Some(60),
                });
            }
        }

        let (resource, action) = split_permission(&request.permission);
        let ctx = AuthzContext {
            user_id: parse_subject_uuid(&request.subject),
            tenant_id: request.tenant_id,
            resource,
            action,
            attributes: request.resource_context.clone(),
        };
        let decision = self.authorization.authorize(ctx).await?;
        resolved_via.push(CheckAxis::RoleAttribute.as_str().to_string());
        if decision.allowed {
            metrics::counter!("check_api_decisions", "axis" => "role_attribute", "result" => "allow").increment(1);
            return Ok(CheckDecision {
                allowed: true,
                resolved_via,
                final_decision: "allow",
                cache_ttl: Some(60),
            });
        }

        resolved_via.push(CheckAxis::Default.as_str().to_string());
        metrics::counter!("check_api_decisions", "axis" => "default", "result" => "deny").increment(1);
        Ok(CheckDecision {
            allowed: false,
            resolved_via,
            final_decision: "deny",
            cache_ttl: None,
        })
    }

    pub async fn batch_check(
        &self,
        requests: &[CheckRequest],
        stop_on_deny: bool,
    ) -> Result<Vec<CheckDecision>, AuthError> {
        let limit = requests.len().min(self.batch_size_limit);
        let mut results = Vec::with_capacity(limit);
        for request in requests.iter().take(limit) {
            let decision = self.check(request).await?;
            let deny = !decision.allowed;
            results.push(decision);
            if stop_on_deny && deny {
                break;
            }
        }
        Ok(results)
    }
}

fn split_permission(permission: &str) -> (String, String) {
    match permission.rsplit_once(':') {
        Some((resource, action)) => (resource.to_string(), action.to_string()),
        None => (permission.to_string(), "access".to_string()),
    }
}

fn parse_subject_uuid(subject: &str) -> Uuid {
    Uuid::parse_str(subject).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, subject.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateRoleRequest, Role};
    use crate::services::authorization::{AuthzDecision, Context, Decision, Policy, RoleAssignment};
    use crate::services::rebac::InMemoryRelationshipStore;

    struct AllowAllAuthorization;

    #[async_trait]
    impl AuthorizationProvider for AllowAllAuthorization {
        async fn authorize(&self, _context: AuthzContext) -> Result<AuthzDecision, AuthError> {
            Ok(AuthzDecision {
                allowed: true,
                reason: "test".into(),
                conditions: vec![],
            })
        }
        async fn create_role(&self, _role: CreateRoleRequest) -> Result<Role, AuthError> {
            unimplemented!()
        }
        async fn assign_role(&self, _assignment: RoleAssignment) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn evaluate_policy(&self, _policy: Policy, _context: Context) -> Result<Decision, AuthError> {
            unimplemented!()
        }
    }

    struct DenyAllAuthorization;

    #[async_trait]
    impl AuthorizationProvider for DenyAllAuthorization {
        async fn authorize(&self, _context: AuthzContext) -> Result<AuthzDecision, AuthError> {
            Ok(AuthzDecision {
                allowed: false,
                reason: "test".into(),
                conditions: vec![],
            })
        }
        async fn create_role(&self, _role: CreateRoleRequest) -> Result<Role, AuthError> {
            unimplemented!()
        }
        async fn assign_role(&self, _assignment: RoleAssignment) -> Result<(), AuthError> {
            unimplemented!()
        }
        async fn evaluate_policy(&self, _policy: Policy, _context: Context) -> Result<Decision, AuthError> {
            unimplemented!()
        }
    }

    fn service(authz: Arc<dyn AuthorizationProvider>) -> UnifiedCheckService {
        let deny = Arc::new(InMemoryDenyRuleStore::new());
        let rebac = Arc::new(ReBACEvaluator::new(Arc::new(InMemoryRelationshipStore::new()), 60));
        UnifiedCheckService::new(deny, rebac, authz, 5, 100)
    }

    #[tokio::test]
    async fn explicit_deny_beats_role_allow() {
        let deny = Arc::new(InMemoryDenyRuleStore::new());
        let tenant = Uuid::new_v4();
        deny.deny(tenant, "alice", "doc:42:read");
        let rebac = Arc::new(ReBACEvaluator::new(Arc::new(InMemoryRelationshipStore::new()), 60));
        let svc = UnifiedCheckService::new(deny, rebac, Arc::new(AllowAllAuthorization), 5, 100);

        let decision = svc
            .check(&CheckRequest {
                subject: "alice".into(),
                subject_type: "user".into(),
                permission: "doc:42:read".into(),
                tenant_id: tenant,
                resource_context: serde_json::json!({}),
                rebac: None,
            })
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.resolved_via, vec!["explicit_deny"]);
    }

    #[tokio::test]
    async fn falls_through_to_role_axis_when_no_rebac_requested() {
        let svc = service(Arc::new(AllowAllAuthorization));
        let tenant = Uuid::new_v4();
        let decision = svc
            .check(&CheckRequest {
                subject: "alice".into(),
                subject_type: "user".into(),
                permission: "doc:42:read".into(),
                tenant_id: tenant,
                resource_context: serde_json::json!({}),
                rebac: None,
            })
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.resolved_via, vec!["role_attribute"]);
    }

    #[tokio::test]
    async fn denies_by_default_when_every_axis_abstains() {
        let svc = service(Arc::new(DenyAllAuthorization));
        let tenant = Uuid::new_v4();
        let decision = svc
            .check(&CheckRequest {
                subject: "alice".into(),
                subject_type: "user".into(),
                permission: "doc:42:read".into(),
                tenant_id: tenant,
                resource_context: serde_json::json!({}),
                rebac: None,
            })
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.final_decision, "deny");
    }

    #[tokio::test]
    async fn batch_check_stops_on_first_deny() {
        let deny = Arc::new(InMemoryDenyRuleStore::new());
        let tenant = Uuid::new_v4();
        deny.deny(tenant, "alice", "doc:1:read");
        let rebac = Arc::new(ReBACEvaluator::new(Arc::new(InMemoryRelationshipStore::new()), 60));
        let svc = UnifiedCheckService::new(deny, rebac, Arc::new(AllowAllAuthorization), 5, 100);

        let requests = vec![
            CheckRequest {
                subject: "alice".into(),
                subject_type: "user".into(),
                permission: "doc:1:read".into(),
                tenant_id: tenant,
                resource_context: serde_json::json!({}),
                rebac: None,
            },
            CheckRequest {
                subject: "alice".into(),
                subject_type: "user".into(),
                permission: "doc:2:read".into(),
                tenant_id: tenant,
                resource_context: serde_json::json!({}),
                rebac: None,
            },
        ];
        let results = svc.batch_check(&requests, true).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn api_key_store_round_trips_by_hash() {
        let store = InMemoryApiKeyStore::new();
        let key = ApiKey {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            client_id: "svc-1".into(),
            name: "ci-runner".into(),
            key_prefix: "sk_live".into(),
            key_hash: "deadbeef".into(),
            allowed_operations: sqlx::types::Json(vec![ApiKeyOperation::Check]),
            rate_limit_tier: "moderate".into(),
            is_active: true,
            expires_at: None,
        };
        store.insert(key.clone());
        let found = store.find_by_hash("deadbeef").await.unwrap().unwrap();
        assert_eq!(found.client_id, "svc-1");
        assert!(store.find_by_hash("missing").await.unwrap().is_none());
    }

    #[test]
    fn api_key_permits_rejects_inactive_and_unlisted_operations() {
        let mut key = ApiKey {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            client_id: "svc-1".into(),
            name: "ci-runner".into(),
            key_prefix: "sk_live".into(),
            key_hash: "deadbeef".into(),
            allowed_operations: sqlx::types::Json(vec![ApiKeyOperation::Check]),
            rate_limit_tier: "moderate".into(),
            is_active: true,
            expires_at: None,
        };
        assert!(api_key_permits(&key, ApiKeyOperation::Check));
        assert!(!api_key_permits(&key, ApiKeyOperation::Batch));
        key.is_active = false;
        assert!(!api_key_permits(&key, ApiKeyOperation::Check));
    }
}
