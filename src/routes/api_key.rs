//! GET /api/api-key
//!
//! Mints a signed key for callers that must not hold the passphrase.

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::error::AppError;
use crate::types::ApiKeyResponse;

pub async fn api_key(
    State(state): State<Arc<crate::AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let key = state.signer.sign_now()?;
    Ok((
        [(CACHE_CONTROL, "no-store")],
        Json(ApiKeyResponse {
            api_key: key.into_inner(),
        }),
    ))
}
