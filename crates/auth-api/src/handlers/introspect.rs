//! POST /introspect — RFC 7662 token introspection endpoint. Transport
//! concerns (content-type gate, form decoding, Basic-auth header extraction)
//! live here; `IntrospectionEngine::introspect` owns everything from client
//! authentication onward.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use auth_core::error::AuthError;
use auth_core::services::introspection::IntrospectionRequest;
use auth_crypto::TokenTypeHint;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IntrospectForm {
    pub token: Option<String>,
    pub token_type_hint: Option<TokenTypeHint>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_assertion: Option<String>,
}

/// Decodes an RFC 7617 `Authorization: Basic base64(client_id:client_secret)`
/// header. `Ok(None)` means no such header was present; a present-but-broken
/// header is a client error, not a signal to fall back to form credentials.
fn basic_auth(headers: &HeaderMap) -> Result<Option<(String, String)>, AuthError> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let malformed = || AuthError::InvalidClient;

    let header = header.to_str().map_err(|_| malformed())?;
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return Ok(None);
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (id, secret) = decoded.split_once(':').ok_or_else(malformed)?;

    let id = urlencoding::decode(id).map_err(|_| malformed())?.into_owned();
    let secret = urlencoding::decode(secret).map_err(|_| malformed())?.into_owned();
    Ok(Some((id, secret)))
}

fn is_form_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

pub async fn introspect(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<auth_core::models::token::IntrospectionResponse>, ApiError> {
    if !is_form_urlencoded(&headers) {
        return Err(AuthError::InvalidRequest { field: "content-type".to_string() }.into());
    }
    let form: IntrospectForm = serde_urlencoded::from_bytes(&body)
        .map_err(|_| AuthError::InvalidRequest { field: "body".to_string() })?;

    let (client_id, client_secret) = match basic_auth(&headers)? {
        Some((id, secret)) => (Some(id), Some(secret)),
        None => (form.client_id.clone(), form.client_secret.clone()),
    };

    // TODO: derive from a resolved tenant/host rather than the nil tenant
    // once multi-tenant host routing lands ahead of this handler.
    let request = IntrospectionRequest {
        tenant_id: Uuid::nil(),
        token: form.token,
        token_type_hint: form.token_type_hint,
        client_id,
        client_secret,
        client_assertion: form.client_assertion,
    };

    let response = state.introspection_engine.introspect(request).await?;
    Ok(Json(response))
}
