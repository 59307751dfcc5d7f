//! Main application entry point for the SSO Platform

use anyhow::Result;
use auth_config::{ConfigLoader, ConfigManager};
use secrecy::ExposeSecret;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing::info;

// Port management
use auth_platform::{shutdown_signal, PortAuthority, PortClass, PortPolicy};

// Repositories
use auth_db::repositories::{
    api_key_repository::ApiKeyRepository, client_repository::ClientRepository,
    key_repository::SigningKeyRepository, rebac_repository::RebacRepository,
    revocation_repository::RevocationRepository, user_repository::UserRepository,
    RoleRepository,
};

// Services
use auth_core::services::{
    authorization::RoleAttributeAuthorization,
    check_service::UnifiedCheckService,
    client_registry::ClientRegistry,
    introspection::{IntrospectionConfig, IntrospectionEngine},
    rate_limiter::RateLimiter,
    rebac::ReBACEvaluator,
    userinfo::UserInfoEngine,
};

use auth_audit::AuditService;
use auth_core::audit::{AuditLogger, BroadcastAuditLogger, TracingAuditLogger};
use auth_core::services::background::audit_worker::{AsyncAuditLogger, AuditWorker};
use auth_extension::WebhookAuditLogger;
use auth_telemetry::AnomalyDetector;

use auth_api::AppState;
use auth_cache::{Cache, MultiLevelCache, RequestCache};
use auth_crypto::KeyStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let environment =
        std::env::var("AUTH__ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let config_loader = ConfigLoader::new("config", &environment);
    let config_manager = ConfigManager::new(config_loader)?;

    let config = config_manager.get_config();

    // Initialize tracing/metrics (auth-telemetry owns the global subscriber
    // and the Prometheus recorder; the otel layer is config-gated).
    auth_telemetry::init_telemetry(config.logging.otel_enabled)?;

    info!("Starting SSO Platform");
    info!("Configuration loaded for environment: {}", environment);

    // Initialize Database - Use MySQL from config
    let database_url = config.database.mysql_url.expose_secret();
    let pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(database_url)
        .await
        .expect("Failed to connect to MySQL database");

    info!("Database connection established");

    // Initialize Repositories
    let role_repo = Arc::new(RoleRepository::new(pool.clone()));
    let user_repo = Arc::new(UserRepository::new(pool.clone()));

    // Anomaly detection hook shared by the token engine and ReBAC evaluator.
    let anomaly_detector = Arc::new(AnomalyDetector::new(50, 3.0));

    // Initialize Token Engine (with in-memory stores for now)
    let token_service: Arc<dyn auth_core::services::token_service::TokenProvider> = Arc::new(
        auth_core::services::token_service::TokenEngine::new()
            .await
            .expect("Failed to initialize TokenEngine")
            .with_anomaly_detector(anomaly_detector.clone()),
    );

    // Initialize Async Audit. Events are persisted via TracingAuditLogger and,
    // for the publish() transport (token.access.introspected, ReBAC write
    // events), fanned out to a webhook endpoint.
    let webhook_logger: Arc<dyn AuditLogger> = Arc::new(WebhookAuditLogger::new(
        config
            .audit_webhook_url
            .clone()
            .unwrap_or_else(|| "mock://webhook.local/events".to_string()),
    ));
    let chain_logger: Arc<dyn AuditLogger> = Arc::new(AuditService::new(pool.clone()));
    let persistent_logger: Arc<dyn AuditLogger> = Arc::new(BroadcastAuditLogger::new(vec![
        Arc::new(TracingAuditLogger),
        chain_logger,
        webhook_logger,
    ]));
    let (async_logger, audit_rx) = AsyncAuditLogger::new(1000);
    let audit_logger: Arc<dyn AuditLogger> = Arc::new(async_logger);

    // Spawn Audit Worker
    let audit_worker = AuditWorker::new(audit_rx, persistent_logger);
    tokio::spawn(audit_worker.run());

    // Initialize Identity Service
    let user_store: Arc<dyn auth_core::services::identity::UserStore> = user_repo.clone();
    let identity_service = Arc::new(auth_core::services::identity::IdentityService::new(
        user_store.clone(),
        token_service,
        audit_logger.clone(),
    ));

    // Initialize Rate Limiter
    let rate_limiter = Arc::new(RateLimiter::new());

    // Initialize Cache
    let redis_url = if let Some(redis_config) = config.external_services.redis {
        Some(redis_config.url)
    } else {
        None
    };

    if redis_url.is_none() && environment == "production" {
        tracing::error!("Production environment detected but Redis is not configured! Falling back to in-memory cache.");
    }

    let cache: Arc<dyn Cache> = match MultiLevelCache::new(redis_url.as_deref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(
                "Failed to connect to Redis: {}. Falling back to in-memory.",
                e
            );
            Arc::new(MultiLevelCache::new(None).unwrap())
        }
    };

    // Initialize token introspection, UserInfo, ReBAC and check-API wiring.
    let client_repo = Arc::new(ClientRepository::new(pool.clone()));
    let client_registry = Arc::new(ClientRegistry::new(client_repo));

    let key_repo = Arc::new(SigningKeyRepository::new(pool.clone()));
    let key_store = Arc::new(KeyStore::new(key_repo));

    let revocation_repo = Arc::new(RevocationRepository::new(pool.clone()));
    let revocation_store: Arc<dyn auth_core::services::revocation::RevocationStore> =
        revocation_repo;

    let request_cache_inner = MultiLevelCache::new(redis_url.as_deref()).unwrap_or_else(|e| {
        tracing::error!(
            "Failed to connect to Redis for request cache: {}. Falling back to in-memory.",
            e
        );
        MultiLevelCache::new(None).unwrap()
    });
    let request_cache = Arc::new(RequestCache::new(request_cache_inner));

    let introspection_engine = Arc::new(IntrospectionEngine::new(
        client_registry.clone(),
        key_store.clone(),
        revocation_store,
        request_cache,
        user_store.clone(),
        audit_logger.clone(),
        IntrospectionConfig {
            issuer: config.issuer_url.clone(),
            cache_enabled: config.introspection_cache.enabled,
            cache_ttl: std::time::Duration::from_secs(config.introspection_cache.ttl_seconds),
            strict_validation: config.introspection_strict_validation.enabled,
            expected_audience: config.introspection_strict_validation.expected_audience.clone(),
        },
    ));

    let userinfo_engine = Arc::new(UserInfoEngine::new(config.issuer_url.clone()));

    let rebac_repo = Arc::new(RebacRepository::new(pool.clone()));
    let rebac_evaluator = Arc::new(
        ReBACEvaluator::new(rebac_repo.clone(), config.rebac.cache_ttl_seconds)
            .with_anomaly_detector(anomaly_detector.clone()),
    );
    let rebac_store: Arc<dyn auth_core::services::rebac::RelationshipStore> = rebac_repo;

    let role_attribute_authorization = Arc::new(RoleAttributeAuthorization::new(role_repo));
    let deny_rule_store = Arc::new(auth_core::services::check_service::InMemoryDenyRuleStore::new());
    let check_service = Arc::new(UnifiedCheckService::new(
        deny_rule_store,
        rebac_evaluator.clone(),
        role_attribute_authorization,
        config.rebac.max_depth,
        config.check_api.batch_size_limit,
    ));

    let api_key_repo = Arc::new(ApiKeyRepository::new(pool.clone()));
    let api_key_store: Arc<dyn auth_core::services::check_service::ApiKeyStore> = api_key_repo;

    let app_state = AppState {
        db: pool,
        identity_service,
        rate_limiter,
        audit_logger,
        cache,
        introspection_engine,
        userinfo_engine,
        key_store,
        user_store,
        client_registry,
        issuer_url: config.issuer_url.clone(),
        check_service,
        check_api_enabled: config.check_api.enabled,
        api_key_store,
        rebac_store,
        rebac_evaluator,
        rebac_max_depth: config.rebac.max_depth,
    };

    // Initialize Router
    let app = auth_api::app(app_state);

    // Initialize Port Authority for production-grade port management
    let port_authority = PortAuthority::new()?;

    // Get or create port policy
    let port_policy = config.server.port_policy.clone().unwrap_or_else(|| {
        // Fallback to legacy port configuration
        PortPolicy::new(config.server.port, PortClass::Public, "http")
            .with_fallback_range((config.server.port + 1)..=(config.server.port + 9))
    });

    // Acquire port with policy enforcement
    let managed_listener = port_authority
        .acquire(&port_policy, &config.server.host)
        .await?;

    let bound_port = managed_listener.port();

    // Determine display host (localhost for 0.0.0.0 binding)
    let display_host = if config.server.host == "0.0.0.0" {
        "localhost"
    } else {
        &config.server.host
    };

    // User-facing startup message
    println!("\n🚀 SSO Platform Starting...");
    println!("📍 Server URL: http://{}:{}", display_host, bound_port);
    println!("🔧 Service: {}", managed_listener.service_name());
    println!(
        "✅ Port Management: Production-grade (PID: {})",
        std::process::id()
    );
    println!(
        "⏱  Graceful Shutdown: {}s drain timeout",
        config.server.drain_timeout_seconds
    );
    println!("📊 Health: http://{}:{}/health", display_host, bound_port);
    println!("📖 Docs: http://{}:{}/swagger-ui", display_host, bound_port);
    println!("\n✨ Ready to accept connections!\n");

    // Convert to tokio listener
    let listener = managed_listener.into_tokio_listener()?;

    // Start server with graceful shutdown

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, initiating graceful shutdown");

            // Release port lease
            if let Err(e) = port_authority.release(bound_port).await {
                tracing::warn!("Failed to release port lease: {}", e);
            }

            info!("Graceful shutdown complete");
        }
    }

    Ok(())
}
