//! GET /health

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::types::HealthResponse;

/// Liveness probe. Reports whether the service runs in production mode.
pub async fn health(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    let mode = if state.config.production {
        "production"
    } else {
        "development"
    };
    Json(HealthResponse {
        status: "ok".into(),
        mode: mode.into(),
    })
}
