use axum::{routing::{delete, get, post}, Router, middleware};
use tower_http::trace::TraceLayer;
use crate::AppState;
use crate::handlers::{
    auth, certs, check, discovery, health, introspect, rebac, userinfo, users,
};
use crate::middleware::{request_id_middleware, security_headers_middleware, RateLimiter};
use std::time::Duration;

pub fn api_router() -> Router<AppState> {
    // Create rate limiter: 5 requests per minute
    let rate_limiter = RateLimiter::new(5, Duration::from_secs(60));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/users/:id/ban", post(users::ban_user))
        .route("/users/:id/activate", post(users::activate_user))
        .route("/.well-known/openid-configuration", get(discovery::oidc_configuration))
        .route("/certs", get(certs::jwks))
        .route("/introspect", post(introspect::introspect))
        .route("/userinfo", get(userinfo::userinfo).post(userinfo::userinfo))
        .route("/api/check", post(check::check))
        .route("/api/check/batch", post(check::batch_check))
        .route("/api/rebac/write", post(rebac::write_tuple))
        .route("/api/rebac/tuples", delete(rebac::delete_tuple))
        .route("/api/rebac/check", post(rebac::check))
        .route("/api/rebac/list-objects", get(rebac::list_objects))
        .route("/api/rebac/list-users", get(rebac::list_users))
        // Add middleware layers (executed bottom-to-top)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(axum::Extension(rate_limiter))
}
