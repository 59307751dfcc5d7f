//! GET/POST /userinfo (spec §4.6). The bearer access token is the caller's
//! authentication; this handler verifies it, resolves the user and client it
//! names, then hands the projection work to `UserInfoEngine`.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use auth_core::error::AuthError;
use auth_core::services::userinfo::UserInfoBody;
use auth_crypto::{TokenCodec, VerifyOptions};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::new(AuthError::InvalidRequest { field: "Authorization".into() }))
}

pub async fn userinfo(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;

    let unverified = TokenCodec::parse_unverified(token)
        .map_err(|_| ApiError::new(AuthError::InvalidRequest { field: "token".into() }))?;

    // TODO: resolve tenant from the verified client_id's registration rather
    // than the nil tenant once multi-tenant host routing precedes this handler.
    let tenant_id = Uuid::nil();

    let header = TokenCodec::peek_header(token)
        .map_err(|_| ApiError::new(AuthError::InvalidRequest { field: "token".into() }))?;
    let key = state
        .key_store
        .get_key_by_kid(tenant_id, header.kid.as_deref())
        .await
        .map_err(|e| ApiError::new(AuthError::ServerError { message: e.to_string() }))?
        .ok_or_else(|| ApiError::new(AuthError::InvalidRequest { field: "token".into() }))?;

    let primary_aud = unverified.aud.primary().map(str::to_string);
    let claims = TokenCodec::verify_with_key_record(
        token,
        &key,
        &state.issuer_url,
        VerifyOptions { audience: primary_aud.as_deref(), skip_audience: primary_aud.is_none() },
    )
    .map_err(|_| ApiError::new(AuthError::InvalidRequest { field: "token".into() }))?;

    if !claims.scope.as_deref().unwrap_or("").split_whitespace().any(|s| s == "openid") {
        return Err(ApiError::new(AuthError::InsufficientScope { required: "openid".into() }));
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::new(AuthError::ServerError { message: "malformed subject".into() }))?;
    let user = state
        .user_store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::new(AuthError::ServerError { message: "user no longer exists".into() }))?;
    let client = state
        .client_registry
        .resolve(tenant_id, &claims.client_id)
        .await?
        .ok_or_else(|| ApiError::new(AuthError::InvalidClientMetadata { message: "unknown client".into() }))?;

    let signing_key = Some(key);
    let body = state
        .userinfo_engine
        .build_response(&claims, &user, &client, signing_key.as_ref())?;

    Ok(match body {
        UserInfoBody::Json(value) => (StatusCode::OK, axum::Json(value)).into_response(),
        UserInfoBody::Jwt(token) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/jwt")],
            token,
        )
            .into_response(),
    })
}
