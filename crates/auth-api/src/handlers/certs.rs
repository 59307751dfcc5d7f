use axum::{extract::State, response::IntoResponse, Json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// GET /certs (spec §4.5) — the active tenant's JWKS.
pub async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    // TODO: resolve tenant from host/client routing once that middleware exists.
    let tenant_id = Uuid::nil();
    let keys = state
        .key_store
        .jwks(tenant_id)
        .await
        .map_err(|e| ApiError::new(auth_core::error::AuthError::ServerError { message: e.to_string() }))?;
    Ok(Json(keys))
}
