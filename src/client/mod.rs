//! Authorized HTTP calls against the backend API.
//!
//! Every attempt syncs the session from the cookie store, attaches a freshly
//! signed `x-api-key` and the bearer token, and on a 401 runs one shared
//! token refresh followed by a single replay.

pub mod auth;
pub mod multipart;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth_event::{self, AuthActivity};
use crate::config::{Config, ConfigError};
use crate::error::{ApiError, RefreshFailure};
use crate::session::refresh::RefreshOutcome;
use crate::session::{RefreshCoordinator, TokenState};
use crate::signer::{
    API_KEY_HEADER, AnyKeySource, ApiKeySigner, ApiKeySource, ClientKeySource, ServerKeySource,
};
use crate::types::{RefreshRequest, RefreshResponse, SuccessResponse};

pub use multipart::{FormPart, MultipartForm};

pub const REFRESH_ENDPOINT: &str = "/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";

/// Body of an outbound request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
    // Serialization failed while building; reported at dispatch.
    Invalid(String),
}

/// Per-call options. Kept cloneable so a call can be replayed verbatim.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    body: RequestBody,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: RequestBody::Empty,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body = match serde_json::to_value(body) {
            Ok(value) => RequestBody::Json(value),
            Err(e) => RequestBody::Invalid(e.to_string()),
        };
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Caller header. Overridden by the key and bearer headers on collision.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

/// Backend API client bound to one session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenState>,
    keys: AnyKeySource,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        tokens: Arc<TokenState>,
        keys: AnyKeySource,
        refresh: RefreshCoordinator,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                tokens,
                keys,
                refresh,
            }),
        }
    }

    /// Client for a context trusted with the passphrase: keys are minted
    /// locally against the edge service's clock.
    pub fn server(config: &Config, tokens: Arc<TokenState>) -> Result<Self, ConfigError> {
        let http = reqwest::Client::new();
        let time_url = config.helper_url("api/utc-time")?;
        let signer = Arc::new(ApiKeySigner::from_config(config));
        let keys = AnyKeySource::Server(ServerKeySource::new(http.clone(), time_url, signer));
        Ok(Self::new(
            http,
            config.api_url.clone(),
            tokens,
            keys,
            RefreshCoordinator::new(config.refresh_timeout),
        ))
    }

    /// Client for an untrusted context: keys come from the edge service.
    pub fn browser(config: &Config, tokens: Arc<TokenState>) -> Result<Self, ConfigError> {
        let http = reqwest::Client::new();
        let key_url = config.helper_url("api/api-key")?;
        let keys = AnyKeySource::Client(ClientKeySource::new(http.clone(), key_url));
        Ok(Self::new(
            http,
            config.api_url.clone(),
            tokens,
            keys,
            RefreshCoordinator::new(config.refresh_timeout),
        ))
    }

    pub fn tokens(&self) -> &Arc<TokenState> {
        &self.inner.tokens
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Perform an authorized call and decode the JSON response.
    ///
    /// A 401 on any endpoint but the refresh endpoint triggers the shared
    /// refresh and exactly one replay. The logout endpoint always succeeds.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let tokens = self.inner.tokens.sync_tokens().await;
        let attempt = self
            .send(endpoint, &options, tokens.access_token.as_deref())
            .await;

        if is_endpoint(endpoint, LOGOUT_ENDPOINT) {
            return logout_outcome(attempt).await;
        }

        let response = attempt?;
        if response.status() == StatusCode::UNAUTHORIZED && !is_endpoint(endpoint, REFRESH_ENDPOINT)
        {
            tracing::debug!(endpoint, "Received 401, refreshing access token");
            let access_token = self
                .refresh_session(tokens.access_token.as_deref())
                .await?;
            let replay = self.send(endpoint, &options, Some(&access_token)).await?;
            return decode(replay).await;
        }

        decode(response).await
    }

    /// POST a multipart form. The form is rebuilt for the replay, if any.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: MultipartForm,
    ) -> Result<T, ApiError> {
        self.request(endpoint, RequestOptions::post().multipart(form))
            .await
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("{endpoint}: {e}")))
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        let mut headers = HeaderMap::new();

        if !options.is_multipart() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }
        if options.is_multipart() {
            // Let the client supply the boundary.
            headers.remove(CONTENT_TYPE);
        }

        match self.inner.keys.api_key().await {
            Some(key) => {
                let value = HeaderValue::from_str(key.as_str())
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                headers.insert(API_KEY_HEADER, value);
            }
            None => tracing::warn!(endpoint, "Sending request without API key"),
        }

        match access_token {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => tracing::debug!(endpoint, "No access token, sending unauthenticated"),
        }

        let mut builder = self.inner.http.request(options.method.clone(), url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        builder = match &options.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(form.to_form()?),
            RequestBody::Invalid(msg) => return Err(ApiError::InvalidRequest(msg.clone())),
        };

        builder
            .headers(headers)
            .send()
            .await
            .map_err(ApiError::from_transport)
    }

    /// Join the in-flight refresh or start one. Every failure has already
    /// cleared the session by the time it is returned.
    ///
    /// `rejected` is the token the 401 was answered for; if the session has
    /// moved on since, the current token is used without another refresh.
    async fn refresh_session(&self, rejected: Option<&str>) -> Result<String, ApiError> {
        if let Some(current) = self.inner.tokens.access_token().await
            && rejected != Some(current.as_str())
            && !self.inner.refresh.is_refreshing()
        {
            tracing::debug!("Session already refreshed, replaying with current token");
            return Ok(current);
        }

        let client = self.clone();
        let outcome = self
            .inner
            .refresh
            .refresh(move || async move { client.run_refresh().await })
            .await;

        if outcome == Err(RefreshFailure::TimedOut) {
            // The cycle was cancelled before it could clean up.
            tracing::warn!("Token refresh timed out, clearing session");
            self.inner.tokens.clear_tokens().await;
        }
        Ok(outcome?)
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let outcome = self.call_refresh_endpoint().await;
        match &outcome {
            Ok(_) => auth_event::emit(AuthActivity::TokenRefresh, true, None, "Access token refreshed"),
            Err(failure) => {
                tracing::warn!(%failure, "Token refresh failed, clearing session");
                self.inner.tokens.clear_tokens().await;
                auth_event::emit(
                    AuthActivity::TokenRefresh,
                    false,
                    None,
                    &failure.to_string(),
                );
            }
        }
        outcome
    }

    async fn call_refresh_endpoint(&self) -> RefreshOutcome {
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .await
            .ok_or(RefreshFailure::NoRefreshToken)?;
        let url = self
            .endpoint_url(REFRESH_ENDPOINT)
            .map_err(|e| RefreshFailure::Unreachable(e.to_string()))?;

        let mut builder = self
            .inner
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token });
        if let Some(key) = self.inner.keys.api_key().await {
            builder = builder.header(API_KEY_HEADER, key.as_str());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RefreshFailure::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RefreshFailure::Rejected(resp.status().as_u16()));
        }

        let body: RefreshResponse = resp.json().await.unwrap_or_default();
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(RefreshFailure::MissingAccessToken)?;

        self.inner
            .tokens
            .set_tokens(&access_token, body.refresh_token.as_deref())
            .await;
        Ok(access_token)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

/// Whether `endpoint` addresses `target`, ignoring query and trailing slash.
fn is_endpoint(endpoint: &str, target: &str) -> bool {
    let path = endpoint.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    let path = path.strip_prefix('/').unwrap_or(path);
    path == target.trim_start_matches('/')
}

/// Logout resolves successfully whatever the server said.
async fn logout_outcome<T: DeserializeOwned>(
    attempt: Result<reqwest::Response, ApiError>,
) -> Result<T, ApiError> {
    match attempt {
        Ok(resp) if resp.status().is_success() => match decode(resp).await {
            Ok(value) => return Ok(value),
            Err(e) => tracing::debug!(error = %e, "Ignoring undecodable logout response"),
        },
        Ok(resp) => tracing::debug!(status = resp.status().as_u16(), "Ignoring logout rejection"),
        Err(e) => tracing::debug!(error = %e, "Ignoring logout transport failure"),
    }
    serde_json::to_value(SuccessResponse { success: true })
        .and_then(serde_json::from_value)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await.map_err(ApiError::from_transport)?;

    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Server-provided `message` or `error`, else `HTTP <status>`.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
