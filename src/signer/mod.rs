//! Time-bound API-key signing.
//!
//! A signed key is `encrypt("<prefix>///<timestamp>")` where the timestamp is
//! UTC seconds with millisecond precision. Keys are minted fresh for every
//! network attempt and never cached.

pub mod cipher;
pub mod source;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::config::Config;

pub use source::{AnyKeySource, ApiKeySource, ClientKeySource, ServerKeySource};

/// Header carrying the signed key on every outbound call.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Separator between prefix and timestamp in the plaintext.
pub const KEY_SEPARATOR: &str = "///";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
    #[error("invalid encoding: {0}")]
    Encoding(String),
    #[error("payload too short: {0} bytes")]
    Truncated(usize),
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Wall-clock source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// An `x-api-key` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedApiKey(String);

impl SignedApiKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SignedApiKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SignedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedApiKey(..)")
    }
}

/// Mints and opens signed API keys and encrypted time payloads.
pub struct ApiKeySigner {
    passphrase: String,
    prefix: String,
    clock: Arc<dyn Clock>,
    // Highest timestamp (ms) handed out so far.
    last_issued: AtomicU64,
}

impl ApiKeySigner {
    pub fn new(passphrase: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            prefix: prefix.into(),
            clock: Arc::new(SystemClock),
            last_issued: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.secret_key.clone(), config.api_key_prefix.clone())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Local clock reading in UTC seconds.
    pub fn local_time(&self) -> f64 {
        self.clock.now_millis() as f64 / 1000.0
    }

    /// Mint a key from a server-provided UTC timestamp in seconds.
    pub fn sign_at(&self, server_time: f64) -> Result<SignedApiKey> {
        if !server_time.is_finite() || server_time < 0.0 {
            return Err(CryptoError::InvalidTimestamp(server_time.to_string()));
        }
        let millis = (server_time * 1000.0).round() as u64;
        self.sign_millis(millis)
    }

    /// Mint a key from the local clock. Used when server time is unavailable.
    pub fn sign_now(&self) -> Result<SignedApiKey> {
        self.sign_millis(self.clock.now_millis())
    }

    fn sign_millis(&self, millis: u64) -> Result<SignedApiKey> {
        let previous = self.last_issued.fetch_max(millis, Ordering::SeqCst);
        let issued = previous.max(millis);
        let plaintext = format!(
            "{}{}{}",
            self.prefix,
            KEY_SEPARATOR,
            format_timestamp(issued)
        );
        cipher::encrypt(plaintext.as_bytes(), &self.passphrase).map(SignedApiKey)
    }

    /// Open a signed key into its prefix and timestamp.
    pub fn open(&self, key: &str) -> Result<(String, f64)> {
        let bytes = cipher::decrypt(key, &self.passphrase)?;
        let plaintext =
            String::from_utf8(bytes).map_err(|e| CryptoError::Payload(e.to_string()))?;
        let (prefix, timestamp) = plaintext
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| CryptoError::Payload("missing separator".into()))?;
        let timestamp = timestamp
            .parse::<f64>()
            .map_err(|_| CryptoError::InvalidTimestamp(timestamp.into()))?;
        Ok((prefix.to_string(), timestamp))
    }

    /// Encrypt a timestamp for the `fx_dyn` field of the time endpoint.
    pub fn encrypt_timestamp(&self, seconds: f64) -> Result<String> {
        cipher::encrypt_json(&seconds, &self.passphrase)
    }

    /// Decode an `fx_dyn` payload back to UTC seconds.
    pub fn decrypt_timestamp(&self, payload: &str) -> Result<f64> {
        let seconds: f64 = cipher::decrypt_json(payload, &self.passphrase)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CryptoError::InvalidTimestamp(seconds.to_string()));
        }
        Ok(seconds)
    }
}

impl fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// `1700000000123` → `"1700000000.123"`.
fn format_timestamp(millis: u64) -> String {
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    fn signer_at(millis: u64) -> ApiKeySigner {
        ApiKeySigner::new("test-secret", "menu-client").with_clock(Arc::new(FixedClock(millis)))
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_700_000_000_123), "1700000000.123");
        assert_eq!(format_timestamp(1_700_000_000_005), "1700000000.005");
        assert_eq!(format_timestamp(0), "0.000");
    }

    #[test]
    fn test_sign_at_opens_to_prefix_and_time() {
        let signer = signer_at(0);
        let key = signer.sign_at(1_700_000_000.123).unwrap();
        let (prefix, ts) = signer.open(key.as_str()).unwrap();
        assert_eq!(prefix, "menu-client");
        assert_eq!(ts, 1_700_000_000.123);
    }

    #[test]
    fn test_sign_now_uses_clock() {
        let signer = signer_at(1_700_000_000_500);
        let key = signer.sign_now().unwrap();
        let (_, ts) = signer.open(key.as_str()).unwrap();
        assert_eq!(ts, 1_700_000_000.5);
    }

    #[test]
    fn test_keys_are_fresh_and_non_decreasing() {
        let signer = signer_at(1_700_000_000_000);
        let first = signer.sign_now().unwrap();
        let second = signer.sign_now().unwrap();
        assert_ne!(first, second);

        let (_, t1) = signer.open(first.as_str()).unwrap();
        let (_, t2) = signer.open(second.as_str()).unwrap();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_server_time_behind_previous_key_is_clamped() {
        let signer = signer_at(0);
        let later = signer.sign_at(1_700_000_100.0).unwrap();
        let earlier = signer.sign_at(1_700_000_000.0).unwrap();

        let (_, t1) = signer.open(later.as_str()).unwrap();
        let (_, t2) = signer.open(earlier.as_str()).unwrap();
        assert_eq!(t2, t1);
    }

    #[test]
    fn test_invalid_server_time() {
        let signer = signer_at(0);
        assert!(signer.sign_at(f64::NAN).is_err());
        assert!(signer.sign_at(-1.0).is_err());
    }

    #[test]
    fn test_timestamp_payload_roundtrip() {
        let signer = signer_at(0);
        let payload = signer.encrypt_timestamp(1_700_000_000.25).unwrap();
        assert_eq!(signer.decrypt_timestamp(&payload).unwrap(), 1_700_000_000.25);
    }

    #[test]
    fn test_other_passphrase_cannot_open() {
        let key = signer_at(0).sign_at(1.0).unwrap();
        let other = ApiKeySigner::new("different", "menu-client");
        assert!(other.open(key.as_str()).is_err());
    }

    #[test]
    fn test_debug_hides_passphrase() {
        let rendered = format!("{:?}", signer_at(0));
        assert!(!rendered.contains("test-secret"));
    }
}
