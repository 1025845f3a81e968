//! Menu auth core: session tokens, signed API keys, and the edge service.
//!
//! The client side (`client`, `session`, `cookie`, `signer`) performs
//! authorized backend calls with transparent token refresh. The edge side
//! (`create_app`) serves the key/time helper endpoints behind subdomain
//! routing.

pub mod auth_event;
pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod signer;
pub mod types;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::middleware::{EdgeRouter, edge_routing};
use crate::signer::ApiKeySigner;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub signer: Arc<ApiKeySigner>,
    pub edge: Arc<EdgeRouter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let signer = Arc::new(ApiKeySigner::from_config(&config));
        Self {
            config,
            signer,
            edge: Arc::new(EdgeRouter::default()),
        }
    }
}

/// Build the edge service.
///
/// Edge routing wraps the whole router from outside, so a rewritten
/// request is matched against the inner routes afresh.
pub fn create_app(state: Arc<AppState>) -> Router {
    // Menu subdomains and the dashboard fetch keys from the app origin.
    let origin = state.config.app_origin.origin().ascii_serialization();
    let cors = match HeaderValue::from_str(&origin) {
        Ok(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin)),
        Err(e) => {
            tracing::warn!(error = %e, %origin, "APP_ORIGIN unusable for CORS, same-origin only");
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET])
    .allow_headers([CONTENT_TYPE]);

    let inner = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/api-key", get(routes::api_key::api_key))
        .route("/api/utc-time", get(routes::utc_time::utc_time))
        .fallback(routes::page::resolved_page)
        .layer(cors)
        .with_state(state.clone());

    Router::new()
        .fallback_service(inner)
        .layer(from_fn_with_state(state.edge.clone(), edge_routing))
        .layer(TraceLayer::new_for_http())
}
