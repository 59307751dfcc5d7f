use axum::{
    extract::{Json, State},
    response::IntoResponse,
    http::StatusCode,
};
use auth_protocols::discovery::generate_oidc_metadata;

use crate::AppState;

/// GET /.well-known/openid-configuration
pub async fn oidc_configuration(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let metadata = generate_oidc_metadata(&state.issuer_url);

    Ok(Json(metadata))
}
