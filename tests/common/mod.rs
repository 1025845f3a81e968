//! Test utilities: edge app builder, request helpers, wiremock-backed client.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use menu_auth::client::ApiClient;
use menu_auth::config::Config;
use menu_auth::cookie::{CookieOptions, CookieStore, MemoryCookieStore};
use menu_auth::session::{
    ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, RefreshCoordinator, TokenState,
};
use menu_auth::signer::{AnyKeySource, ApiKeySigner, ServerKeySource};
use menu_auth::{AppState, create_app};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::MockServer;

/// Build the edge app with the test configuration.
pub fn build_test_app() -> (axum::Router, Arc<AppState>) {
    build_test_app_with_config(Config::test_default())
}

pub fn build_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    let app = create_app(state.clone());
    (app, state)
}

/// GET `uri` with the given `Host` header.
pub fn get_with_host(host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// A client wired to a mock backend, with its cookie jar and signer exposed.
pub struct TestBackend {
    pub server: MockServer,
    pub client: ApiClient,
    pub store: Arc<MemoryCookieStore>,
    pub signer: Arc<ApiKeySigner>,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self::start_with_timeout(Duration::from_secs(5)).await
    }

    pub async fn start_with_timeout(refresh_timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryCookieStore::new());
        let signer = Arc::new(ApiKeySigner::new("test-secret-key", "menu-client"));

        let tokens = Arc::new(TokenState::hydrate(store.clone(), false));
        let keys = AnyKeySource::Server(ServerKeySource::local(signer.clone()));
        let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let client = ApiClient::new(
            reqwest::Client::new(),
            base_url,
            tokens,
            keys,
            RefreshCoordinator::new(refresh_timeout),
        );

        Self {
            server,
            client,
            store,
            signer,
        }
    }

    /// Put a session in the cookie jar, as if logged in from another tab.
    pub fn seed_cookies(&self, access_token: &str, refresh_token: Option<&str>) {
        self.store
            .set(ACCESS_TOKEN_COOKIE, access_token, &CookieOptions::lax(7, false));
        if let Some(refresh) = refresh_token {
            self.store
                .set(REFRESH_TOKEN_COOKIE, refresh, &CookieOptions::lax(30, false));
        }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.store.get(name)
    }
}
