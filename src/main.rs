//! Edge service entrypoint.
//!
//! Serves the helper endpoints behind subdomain routing on `PORT`.

use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use menu_auth::config::Config;
use menu_auth::{AppState, create_app};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let production = env::var("APP_ENV")
        .or_else(|_| env::var("NODE_ENV"))
        .is_ok_and(|v| v == "production");

    // Init tracing: JSON in production, pretty otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if production {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        api_url = %config.api_url,
        app_origin = %config.app_origin,
        production = config.production,
        "Configuration loaded"
    );

    let app = create_app(Arc::new(AppState::new(config)));

    tracing::info!("Starting edge server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
