use crate::error::AuthError;
use crate::models::{CreateRoleRequest, Role};
use crate::services::authorization::policy::{AuthContext, PolicyDecision, PolicyEngine};
use crate::services::authorization::service::RoleStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn authorize(&self, context: AuthzContext) -> Result<AuthzDecision, AuthError>;
    async fn create_role(&self, role: CreateRoleRequest) -> Result<Role, AuthError>;
    async fn assign_role(&self, assignment: RoleAssignment) -> Result<(), AuthError>;
    async fn evaluate_policy(&self, policy: Policy, context: Context) -> Result<Decision, AuthError>;
}

#[derive(Debug, Clone)]
pub struct AuthzContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub resource: String,
    pub action: String,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AuthzDecision {
    pub allowed: bool,
    pub reason: String,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub id: Uuid,
    pub name: String,
    pub rules: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub permit: bool,
    pub obligations: Vec<String>,
}

fn attributes_from_json(value: &serde_json::Value) -> HashMap<String, String> {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => HashMap::new(),
    }
}

/// `AuthorizationProvider` backed by the tenant's role set and the ABAC
/// `PolicyEngine` — the role/attribute axis `UnifiedCheckService` falls back
/// to once ReBAC has no opinion.
pub struct RoleAttributeAuthorization {
    roles: Arc<dyn RoleStore>,
}

impl RoleAttributeAuthorization {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl AuthorizationProvider for RoleAttributeAuthorization {
    async fn authorize(&self, context: AuthzContext) -> Result<AuthzDecision, AuthError> {
        let roles = self.roles.list(context.tenant_id).await?;
        let auth_context = AuthContext {
            user_id: context.user_id,
            tenant_id: context.tenant_id,
            roles,
            attributes: attributes_from_json(&context.attributes),
        };
        match PolicyEngine::evaluate(&context.action, &auth_context, None) {
            PolicyDecision::Allow => Ok(AuthzDecision {
                allowed: true,
                reason: "role grants permission".to_string(),
                conditions: vec![],
            }),
            PolicyDecision::Deny(reason) => Ok(AuthzDecision {
                allowed: false,
                reason,
                conditions: vec![],
            }),
        }
    }

    async fn create_role(&self, request: CreateRoleRequest) -> Result<Role, AuthError> {
        let role = Role {
            id: Uuid::new_v4(),
            // TODO: CreateRoleRequest carries no tenant_id; thread one through
            // once this trait method gains an HTTP-layer caller.
            tenant_id: Uuid::nil(),
            name: request.name,
            description: request.description,
            parent_role_id: request.parent_role_id,
            is_system_role: false,
            permissions: request.permissions,
            constraints: request.constraints,
            organization_id: None,
            scope: crate::models::RoleScope::Tenant,
            metadata: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
        };
        self.roles.create(role).await
    }

    async fn assign_role(&self, _assignment: RoleAssignment) -> Result<(), AuthError> {
        // TODO: no user-to-role assignment table exists yet; wire one in once
        // role grants move off the registration-time default role.
        Ok(())
    }

    async fn evaluate_policy(&self, _policy: Policy, context: Context) -> Result<Decision, AuthError> {
        let roles = self.roles.list(context.tenant_id).await?;
        let auth_context = AuthContext {
            user_id: context.user_id,
            tenant_id: context.tenant_id,
            roles,
            attributes: attributes_from_json(&context.attributes),
        };
        match PolicyEngine::evaluate("policy", &auth_context, None) {
            PolicyDecision::Allow => Ok(Decision { permit: true, obligations: vec![] }),
            PolicyDecision::Deny(_) => Ok(Decision { permit: false, obligations: vec![] }),
        }
    }
}

pub struct AuthorizationEngine {
    // Implementation will be added in later tasks
}

impl AuthorizationEngine {
    pub fn new() -> Self {
        Self {}
    }
}
impl Default for AuthorizationEngine {
    fn default() -> Self {
        Self::new()
    }
}
