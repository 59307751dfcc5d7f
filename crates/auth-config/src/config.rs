//! Core configuration structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use auth_platform::PortPolicy;

#[cfg(test)]
use proptest_derive::Arbitrary;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub features: FeatureConfig,
    pub logging: LoggingConfig,
    pub external_services: ExternalServicesConfig,
    /// Public issuer URL stamped into tokens/introspection responses and the
    /// discovery document. No default — startup fails without it.
    pub issuer_url: String,
    pub introspection_cache: IntrospectionCacheConfig,
    pub introspection_strict_validation: IntrospectionStrictValidationConfig,
    pub rebac: RebacConfig,
    pub check_api: CheckApiConfig,
    /// Webhook endpoint the `publish()` transport dispatches
    /// `token.access.introspected` and ReBAC write events to. `None` uses a
    /// `mock://` URL that is logged but never dialed.
    pub audit_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    pub host: String,
    pub workers: Option<usize>,
    pub max_connections: Option<u32>,
    pub timeout_seconds: Option<u64>,
    /// Overrides the default-derived public-port policy when set.
    pub port_policy: Option<PortPolicy>,
    pub drain_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IntrospectionCacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IntrospectionStrictValidationConfig {
    pub enabled: bool,
    pub expected_audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RebacConfig {
    #[validate(range(min = 1, max = 32))]
    pub max_depth: u32,
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckApiConfig {
    pub enabled: bool,
    #[validate(range(min = 1, max = 1000))]
    pub batch_size_limit: usize,
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub mysql_url: secrecy::Secret<String>,
    pub sqlite_url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: secrecy::Secret<String>,
    pub jwt_expiry_minutes: u32,
    pub refresh_token_expiry_days: u32,
    pub password_min_length: u8,
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: u32,
    pub require_mfa: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub enabled_features: HashMap<String, bool>,
    pub feature_limits: HashMap<String, u64>,
    pub tenant_overrides: HashMap<String, HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub structured: bool,
    /// Toggles the `tracing_opentelemetry` layer in `auth_telemetry::init_telemetry`.
    pub otel_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServicesConfig {
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: secrecy::Secret<String>,
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub provider: String,
    #[serde(skip_serializing)]
    pub api_key: secrecy::Secret<String>,
    pub from_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8081,
                host: "0.0.0.0".to_string(),
                workers: None,
                max_connections: Some(1000),
                timeout_seconds: Some(30),
                port_policy: None,
                drain_timeout_seconds: 30,
            },
            database: DatabaseConfig {
                mysql_url: secrecy::Secret::new("mysql://localhost/auth".to_string()),
                sqlite_url: Some(":memory:".to_string()),
                max_connections: 10,
                min_connections: 1,
                connection_timeout: 30,
                idle_timeout: 600,
                max_lifetime: 3600,
            },
            security: SecurityConfig {
                jwt_secret: secrecy::Secret::new("change-me-in-production".to_string()),
                jwt_expiry_minutes: 15,
                refresh_token_expiry_days: 30,
                password_min_length: 8,
                max_login_attempts: 5,
                lockout_duration_minutes: 15,
                require_mfa: false,
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            features: FeatureConfig {
                enabled_features: HashMap::new(),
                feature_limits: HashMap::new(),
                tenant_overrides: HashMap::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                output: "stdout".to_string(),
                structured: true,
                otel_enabled: false,
            },
            external_services: ExternalServicesConfig {
                smtp: None,
                sms: None,
                redis: None,
            },
            issuer_url: "http://localhost:8081".to_string(),
            introspection_cache: IntrospectionCacheConfig {
                enabled: true,
                ttl_seconds: 30,
            },
            introspection_strict_validation: IntrospectionStrictValidationConfig {
                enabled: false,
                expected_audience: None,
            },
            rebac: RebacConfig {
                max_depth: 5,
                cache_ttl_seconds: 60,
            },
            check_api: CheckApiConfig {
                enabled: false,
                batch_size_limit: 100,
                debug_mode: false,
            },
            audit_webhook_url: None,
        }
    }
}