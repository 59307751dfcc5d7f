//! POST /api/check, /api/check/batch (spec §4.8, §6). Gated by the
//! `check_api` layer when `config.check_api.enabled` — the caller presents
//! either a `chk_`-prefixed API key (SHA-256 hash lookup through
//! `ApiKeyStore`) or an access-token JWT (verified via JWKS/issuer through
//! `KeyStore`/`TokenCodec`, same machinery `IntrospectionEngine` uses). The
//! rate-limit tier applied afterward is derived from whichever credential
//! authenticated the call.

use axum::{
    extract::{Json, State},
    http::{header, HeaderMap},
};
use auth_core::error::AuthError;
use auth_core::models::rebac::RateLimitTier;
use auth_core::services::check_service::{ApiKeyOperation, CheckDecision, CheckRequest, api_key_permits};
use auth_crypto::{TokenCodec, VerifyOptions};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

const API_KEY_PREFIX: &str = "chk_";

fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A JWT access token carries no API-key-style `allowed_operations`; any
/// token that verifies is authorized for the check API (§6 doesn't gate
/// operations on the JWT branch the way it does for API keys), and its tier
/// defaults to `moderate`.
const JWT_TIER: RateLimitTier = RateLimitTier::Moderate;

async fn authorize_caller(
    state: &AppState,
    tenant_id: Uuid,
    headers: &HeaderMap,
    operation: ApiKeyOperation,
) -> Result<(), ApiError> {
    if !state.check_api_enabled {
        return Ok(());
    }

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::new(AuthError::InvalidClient))?;

    let (rate_key, tier) = if let Some(secret) = presented.strip_prefix(API_KEY_PREFIX) {
        let key = state
            .api_key_store
            .find_by_hash(&hash_api_key(secret))
            .await?
            .ok_or_else(|| ApiError::new(AuthError::InvalidClient))?;
        if !api_key_permits(&key, operation) {
            return Err(ApiError::new(AuthError::InsufficientScope { required: "check_api".into() }));
        }
        (format!("check:apikey:{}", key.id), key.tier())
    } else {
        let header = TokenCodec::peek_header(presented).map_err(|_| ApiError::new(AuthError::InvalidClient))?;
        let key = state
            .key_store
            .get_key_by_kid(tenant_id, header.kid.as_deref())
            .await
            .map_err(|_| ApiError::new(AuthError::InvalidClient))?
            .ok_or_else(|| ApiError::new(AuthError::InvalidClient))?;
        let claims = TokenCodec::verify_with_key_record(
            presented,
            &key,
            &state.issuer_url,
            VerifyOptions { audience: None, skip_audience: true },
        )
        .map_err(|_| ApiError::new(AuthError::InvalidClient))?;
        (format!("check:jwt:{}", claims.sub), JWT_TIER)
    };

    if !state.rate_limiter.check_tier(&rate_key, tier).await {
        return Err(ApiError::new(AuthError::RateLimitExceeded {
            limit: tier.requests_per_minute(),
            window: "1m".into(),
        }));
    }
    Ok(())
}

pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Result<Json<CheckDecision>, ApiError> {
    authorize_caller(&state, request.tenant_id, &headers, ApiKeyOperation::Check).await?;
    let decision = state.check_service.check(&request).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct BatchCheckRequest {
    pub requests: Vec<CheckRequest>,
    #[serde(default)]
    pub stop_on_deny: bool,
}

pub async fn batch_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchCheckRequest>,
) -> Result<Json<Vec<CheckDecision>>, ApiError> {
    let tenant_id = request
        .requests
        .first()
        .map(|r| r.tenant_id)
        .unwrap_or_else(Uuid::nil);
    authorize_caller(&state, tenant_id, &headers, ApiKeyOperation::Batch).await?;
    let decisions = state
        .check_service
        .batch_check(&request.requests, request.stop_on_deny)
        .await?;
    Ok(Json(decisions))
}
