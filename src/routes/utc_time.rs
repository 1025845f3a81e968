//! GET /api/utc-time
//!
//! Server time as an encrypted `fx_dyn` payload, so key minting elsewhere
//! can use this clock instead of a skewed local one.

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::error::AppError;
use crate::types::UtcTimeResponse;

pub async fn utc_time(
    State(state): State<Arc<crate::AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let now = state.signer.local_time();
    let fx_dyn = state.signer.encrypt_timestamp(now)?;
    Ok(([(CACHE_CONTROL, "no-store")], Json(UtcTimeResponse { fx_dyn })))
}
