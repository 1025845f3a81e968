//! Where a request gets its `x-api-key` from.
//!
//! - `ServerKeySource` holds the passphrase and mints keys itself, using the
//!   time endpoint for server time when reachable.
//! - `ClientKeySource` never sees the passphrase; it asks the key endpoint
//!   for a server-minted key.
//!
//! Both degrade instead of failing: no key source error ever reaches the
//! caller of the request pipeline.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use super::{ApiKeySigner, CryptoError, SignedApiKey};
use crate::types::{ApiKeyResponse, UtcTimeResponse};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplies one fresh signed key per call.
pub trait ApiKeySource: Send + Sync {
    /// A freshly signed key, or `None` if none could be obtained.
    fn api_key(&self) -> impl std::future::Future<Output = Option<SignedApiKey>> + Send;
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Mints keys locally, preferring server time from `GET /api/utc-time`.
pub struct ServerKeySource {
    http: reqwest::Client,
    time_url: Option<Url>,
    signer: Arc<ApiKeySigner>,
}

impl ServerKeySource {
    pub fn new(http: reqwest::Client, time_url: Url, signer: Arc<ApiKeySigner>) -> Self {
        Self {
            http,
            time_url: Some(time_url),
            signer,
        }
    }

    /// Sign with the local clock only. Used by the edge service itself, which
    /// is the time authority.
    pub fn local(signer: Arc<ApiKeySigner>) -> Self {
        Self {
            http: reqwest::Client::new(),
            time_url: None,
            signer,
        }
    }

    async fn server_time(&self, url: &Url) -> Result<f64, FetchError> {
        let resp = self
            .http
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let body: UtcTimeResponse = resp.json().await?;
        Ok(self.signer.decrypt_timestamp(&body.fx_dyn)?)
    }
}

impl ApiKeySource for ServerKeySource {
    async fn api_key(&self) -> Option<SignedApiKey> {
        let signed = match &self.time_url {
            Some(url) => match self.server_time(url).await {
                Ok(server_time) => self.signer.sign_at(server_time),
                Err(e) => {
                    tracing::warn!(error = %e, "Server time unavailable, signing with local clock");
                    self.signer.sign_now()
                }
            },
            None => self.signer.sign_now(),
        };

        match signed {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::error!(error = %e, "API key signing failed");
                None
            }
        }
    }
}

/// Fetches server-minted keys from `GET /api/api-key`.
pub struct ClientKeySource {
    http: reqwest::Client,
    key_url: Url,
    fallback: Option<Arc<ApiKeySigner>>,
}

impl ClientKeySource {
    pub fn new(http: reqwest::Client, key_url: Url) -> Self {
        Self {
            http,
            key_url,
            fallback: None,
        }
    }

    /// Sign locally when the key endpoint cannot be reached. Only for
    /// contexts that are trusted with the passphrase.
    pub fn with_fallback(mut self, signer: Arc<ApiKeySigner>) -> Self {
        self.fallback = Some(signer);
        self
    }

    async fn fetch_key(&self) -> Result<SignedApiKey, FetchError> {
        let resp = self
            .http
            .get(self.key_url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let body: ApiKeyResponse = resp.json().await?;
        Ok(SignedApiKey::from(body.api_key))
    }
}

impl ApiKeySource for ClientKeySource {
    async fn api_key(&self) -> Option<SignedApiKey> {
        match self.fetch_key().await {
            Ok(key) => Some(key),
            Err(e) => match &self.fallback {
                Some(signer) => {
                    tracing::warn!(error = %e, "API key endpoint unavailable, signing locally");
                    signer.sign_now().ok()
                }
                None => {
                    tracing::warn!(error = %e, "API key endpoint unavailable, sending without key");
                    None
                }
            },
        }
    }
}

/// Type-erased key source.
///
/// `ApiKeySource` uses RPITIT and is not object-safe, so this enum
/// dispatches manually instead.
pub enum AnyKeySource {
    Server(ServerKeySource),
    Client(ClientKeySource),
}

impl ApiKeySource for AnyKeySource {
    async fn api_key(&self) -> Option<SignedApiKey> {
        match self {
            AnyKeySource::Server(s) => s.api_key().await,
            AnyKeySource::Client(s) => s.api_key().await,
        }
    }
}
