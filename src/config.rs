//! Application configuration via environment variables.
//!
//! Accepts both the server-side names (`API_URL`) and the public build-time
//! names (`NEXT_PUBLIC_API_URL`) the front end was deployed with.

use std::env;
use std::time::Duration;

use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub app_origin: Url,
    pub secret_key: String,
    pub api_key_prefix: String,
    pub production: bool,
    pub port: u16,
    pub refresh_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Required: `API_URL` (or `NEXT_PUBLIC_API_URL`) and `SECRET_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("API_URL")
            .or_else(|| lookup("NEXT_PUBLIC_API_URL"))
            .ok_or_else(|| ConfigError::MissingEnv("API_URL".into()))?;
        let api_url = parse_base_url("API_URL", &api_url)?;

        let secret_key = lookup("SECRET_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnv("SECRET_KEY".into()))?;

        let environment = lookup("APP_ENV")
            .or_else(|| lookup("NODE_ENV"))
            .unwrap_or_else(|| "development".into());

        let port = match lookup("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT".into(), v))?,
            None => 3000,
        };

        let app_origin = match lookup("APP_ORIGIN") {
            Some(v) => parse_base_url("APP_ORIGIN", &v)?,
            None => parse_base_url("APP_ORIGIN", &format!("http://localhost:{port}"))?,
        };

        let refresh_timeout = match lookup("REFRESH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| ConfigError::Invalid("REFRESH_TIMEOUT_SECS".into(), v))?,
            ),
            None => Duration::from_secs(15),
        };

        Ok(Self {
            api_url,
            app_origin,
            secret_key,
            api_key_prefix: lookup("API_KEY_PREFIX").unwrap_or_else(|| "menu-client".into()),
            production: environment == "production",
            port,
            refresh_timeout,
        })
    }

    /// Whether cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.production
    }

    /// URL of a same-origin helper endpoint such as `api/api-key`.
    pub fn helper_url(&self, path: &str) -> Result<Url, ConfigError> {
        self.app_origin
            .join(path.trim_start_matches('/'))
            .map_err(|_| ConfigError::Invalid("APP_ORIGIN".into(), path.into()))
    }
}

/// Configuration for testing. All fields are settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:4000/").expect("static URL"),
            app_origin: Url::parse("http://localhost:3000/").expect("static URL"),
            secret_key: "test-secret-key".into(),
            api_key_prefix: "menu-client".into(),
            production: false,
            port: 3000,
            refresh_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// Parse a base URL, forcing a trailing slash so `Url::join` keeps the path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|_| ConfigError::Invalid(key.into(), raw.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_creates_valid_config() {
        let cfg = Config::test_default();
        assert_eq!(cfg.api_key_prefix, "menu-client");
        assert_eq!(cfg.port, 3000);
        assert!(!cfg.secure_cookies());
    }

    #[test]
    fn test_from_lookup_minimal() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("API_URL", "https://api.mysite.com/v1"),
            ("SECRET_KEY", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_url.as_str(), "https://api.mysite.com/v1/");
        assert_eq!(cfg.app_origin.as_str(), "http://localhost:3000/");
        assert_eq!(cfg.refresh_timeout, Duration::from_secs(15));
        assert!(!cfg.production);
    }

    #[test]
    fn test_public_api_url_fallback() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("NEXT_PUBLIC_API_URL", "https://public.mysite.com"),
            ("SECRET_KEY", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_url.as_str(), "https://public.mysite.com/");
    }

    #[test]
    fn test_node_env_production_enables_secure_cookies() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("API_URL", "https://api.mysite.com"),
            ("SECRET_KEY", "s3cret"),
            ("NODE_ENV", "production"),
        ]))
        .unwrap();
        assert!(cfg.secure_cookies());
    }

    #[test]
    fn test_missing_secret_key() {
        let err = Config::from_lookup(lookup_from(&[("API_URL", "https://api.mysite.com")]))
            .unwrap_err();
        assert!(err.to_string().contains("SECRET_KEY"));
    }

    #[test]
    fn test_missing_api_url() {
        let err = Config::from_lookup(lookup_from(&[("SECRET_KEY", "x")])).unwrap_err();
        assert!(err.to_string().contains("API_URL"));
    }

    #[test]
    fn test_helper_url_joins_origin() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("API_URL", "https://api.mysite.com"),
            ("SECRET_KEY", "s3cret"),
            ("APP_ORIGIN", "https://dashboard.mysite.com"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.helper_url("/api/api-key").unwrap().as_str(),
            "https://dashboard.mysite.com/api/api-key"
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("API_URL", "https://api.mysite.com"),
            ("SECRET_KEY", "s3cret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
