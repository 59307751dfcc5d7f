use axum::Router;
use sqlx::MySqlPool;
use std::sync::Arc;
use auth_core::services::{
    rate_limiter::RateLimiter,
    check_service::{ApiKeyStore, UnifiedCheckService},
    client_registry::ClientRegistry,
    identity::UserStore,
    introspection::IntrospectionEngine,
    rebac::{ReBACEvaluator, RelationshipStore},
    userinfo::UserInfoEngine,
};
use auth_crypto::KeyStore;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod router;
pub mod handlers;
pub mod error;
pub mod validation;
pub mod middleware;

use auth_cache::Cache;

/// OpenAPI documentation for the Enterprise SSO Platform
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login,
        handlers::auth::register,
        handlers::users::ban_user,
        handlers::users::activate_user,
        handlers::health::health_check,
    ),
    components(
        schemas(
            auth_core::services::identity::AuthRequest,
            auth_core::services::identity::AuthResponse,
            auth_core::models::user::User,
            auth_core::models::user::CreateUserRequest,
            auth_core::models::user::UserStatus,
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "Authentication", description = "User authentication and registration endpoints"),
        (name = "User Management", description = "User administration endpoints"),
        (name = "Health", description = "Service health check endpoints")
    ),
    info(
        title = "Enterprise SSO Platform API",
        version = "0.1.0",
        description = "Production-ready SSO and Identity Platform supporting OIDC, SAML, OAuth 2.1, and SCIM 2.0",
        contact(
            name = "API Support",
            email = "support@example.com"
        )
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: MySqlPool,
    pub identity_service: Arc<auth_core::services::identity::IdentityService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit_logger: Arc<dyn auth_core::audit::AuditLogger>,
    pub cache: Arc<dyn Cache>,
    pub introspection_engine: Arc<IntrospectionEngine>,
    pub userinfo_engine: Arc<UserInfoEngine>,
    pub key_store: Arc<KeyStore>,
    pub user_store: Arc<dyn UserStore>,
    pub client_registry: Arc<ClientRegistry>,
    pub issuer_url: String,
    pub check_service: Arc<UnifiedCheckService>,
    pub check_api_enabled: bool,
    pub api_key_store: Arc<dyn ApiKeyStore>,
    pub rebac_store: Arc<dyn RelationshipStore>,
    pub rebac_evaluator: Arc<ReBACEvaluator>,
    pub rebac_max_depth: u32,
}

pub fn app(state: AppState) -> Router {
    router::api_router()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// Make services extractable from AppState via State<Arc<Service>>
impl axum::extract::FromRef<AppState> for Arc<auth_core::services::identity::IdentityService> {
    fn from_ref(state: &AppState) -> Self {
        state.identity_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<RateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn auth_core::audit::AuditLogger> {
    fn from_ref(state: &AppState) -> Self {
        state.audit_logger.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn Cache> {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<IntrospectionEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.introspection_engine.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<UserInfoEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.userinfo_engine.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<KeyStore> {
    fn from_ref(state: &AppState) -> Self {
        state.key_store.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn UserStore> {
    fn from_ref(state: &AppState) -> Self {
        state.user_store.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ClientRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.client_registry.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<UnifiedCheckService> {
    fn from_ref(state: &AppState) -> Self {
        state.check_service.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn ApiKeyStore> {
    fn from_ref(state: &AppState) -> Self {
        state.api_key_store.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn RelationshipStore> {
    fn from_ref(state: &AppState) -> Self {
        state.rebac_store.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ReBACEvaluator> {
    fn from_ref(state: &AppState) -> Self {
        state.rebac_evaluator.clone()
    }
}
