//! Edge routing: public menu subdomains and locale-prefixed menu paths.
//!
//! `pizza.mysite.com/` is served from the internal route `/ar/menu/pizza`,
//! and `mysite.com/en/menu/pizza` is redirected to the restaurant's own
//! subdomain. Decisions are pure functions of host, path and query.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use url::form_urlencoded;

pub const SUPPORTED_LOCALES: &[&str] = &["en", "ar"];
pub const DEFAULT_LOCALE: &str = "ar";

/// Path prefixes that are never rewritten on a menu subdomain.
pub const PASSTHROUGH_PREFIXES: &[&str] = &["/api", "/_next", "/images", "/uploads"];

/// What the edge does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// 307 to an absolute URL.
    Redirect { location: String },
    /// Serve this internal path (query included) instead.
    Rewrite { path_and_query: String },
    Pass,
}

/// The parts of a request routing looks at.
#[derive(Debug, Clone, Default)]
pub struct EdgeRequest {
    /// `Host` value, port included.
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    /// `x-forwarded-proto`, when behind a proxy.
    pub forwarded_proto: Option<String>,
}

impl EdgeRequest {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();
        let forwarded_proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        Self {
            host,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            forwarded_proto,
        }
    }

    /// Host without port, lowercased.
    pub fn hostname(&self) -> String {
        split_host(&self.host).0.to_ascii_lowercase()
    }

    fn query_suffix(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("?{q}"),
            _ => String::new(),
        }
    }

    /// `preview=true` or `preview=1` in the query.
    pub fn is_preview(&self) -> bool {
        let query = self.query.as_deref().unwrap_or_default();
        form_urlencoded::parse(query.as_bytes())
            .any(|(k, v)| k == "preview" && (v == "true" || v == "1"))
    }
}

/// Split `host[:port]` (IPv6 literals in brackets) into hostname and port.
fn split_host(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((ip, tail)) => (ip, tail.strip_prefix(':')),
            None => (host, None),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (name, Some(port))
        }
        _ => (host, None),
    }
}

fn is_local(hostname: &str) -> bool {
    hostname == "localhost"
        || hostname.ends_with(".localhost")
        || hostname.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Subdomain label of `hostname`, if it names a restaurant.
pub fn extract_subdomain(hostname: &str) -> Option<&str> {
    if hostname.is_empty() || hostname.parse::<IpAddr>().is_ok() {
        return None;
    }
    let parts: Vec<&str> = hostname.split('.').collect();
    let first = *parts.first()?;
    if first.is_empty() {
        return None;
    }

    if is_local(hostname) {
        (parts.len() >= 2 && first != "localhost" && first != "www").then_some(first)
    } else {
        (parts.len() >= 3 && first != "www" && first != "dashboard").then_some(first)
    }
}

/// `(locale, slug)` when `path` is `/<locale>/menu/<slug>`.
fn match_menu_path<'a>(path: &'a str, locales: &[String]) -> Option<(&'a str, &'a str)> {
    let trimmed = path.strip_prefix('/')?;
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let mut segments = trimmed.split('/');
    let locale = segments.next()?;
    let menu = segments.next()?;
    let slug = segments.next()?;
    if segments.next().is_some() || menu != "menu" || slug.is_empty() {
        return None;
    }
    locales.iter().any(|l| l == locale).then_some((locale, slug))
}

/// Routing rules for the edge. Stateless per request.
#[derive(Debug, Clone)]
pub struct EdgeRouter {
    locales: Vec<String>,
    default_locale: String,
    passthrough: Vec<String>,
}

impl Default for EdgeRouter {
    fn default() -> Self {
        Self {
            locales: SUPPORTED_LOCALES.iter().map(|s| s.to_string()).collect(),
            default_locale: DEFAULT_LOCALE.into(),
            passthrough: PASSTHROUGH_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EdgeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, req: &EdgeRequest) -> EdgeDecision {
        let hostname = req.hostname();
        let subdomain = extract_subdomain(&hostname);

        if let Some((locale, slug)) = match_menu_path(&req.path, &self.locales)
            && !subdomain.is_some_and(|s| s.eq_ignore_ascii_case(slug))
            && !req.is_preview()
        {
            let location = format!(
                "{}://{}.{}/{}/menu/{}{}",
                self.protocol(req),
                slug.to_ascii_lowercase(),
                self.base_host(req),
                locale,
                slug,
                req.query_suffix()
            );
            return EdgeDecision::Redirect { location };
        }

        let Some(subdomain) = subdomain else {
            return EdgeDecision::Pass;
        };
        if self.is_passthrough(&req.path) {
            return EdgeDecision::Pass;
        }

        let expected = format!("/{}/menu/{}", self.locale_for(&req.path), subdomain);
        if req.path == expected || req.path.strip_suffix('/') == Some(expected.as_str()) {
            return EdgeDecision::Pass;
        }

        EdgeDecision::Rewrite {
            path_and_query: format!("{expected}{}", req.query_suffix()),
        }
    }

    fn is_passthrough(&self, path: &str) -> bool {
        self.passthrough.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Leading locale segment, or the default.
    fn locale_for<'a>(&'a self, path: &'a str) -> &'a str {
        let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
        if self.locales.iter().any(|l| l == first) {
            first
        } else {
            &self.default_locale
        }
    }

    fn protocol<'a>(&self, req: &'a EdgeRequest) -> &'a str {
        match req.forwarded_proto.as_deref() {
            Some(proto @ ("http" | "https")) => proto,
            _ if is_local(&req.hostname()) => "http",
            _ => "https",
        }
    }

    /// Request host minus a restaurant, `www` or `dashboard` label.
    fn base_host(&self, req: &EdgeRequest) -> String {
        let hostname = req.hostname();
        let (_, port) = split_host(&req.host);
        let parts: Vec<&str> = hostname.split('.').collect();

        let strip = extract_subdomain(&hostname).is_some()
            || (parts.len() >= 2 && matches!(parts[0], "www" | "dashboard"));
        let base = if strip {
            parts[1..].join(".")
        } else {
            hostname.clone()
        };

        match port {
            Some(port) => format!("{base}:{port}"),
            None => base,
        }
    }
}

/// Axum middleware applying `EdgeRouter` decisions.
///
/// Must wrap the router from outside so a rewritten URI is routed again.
pub async fn edge_routing(
    State(router): State<Arc<EdgeRouter>>,
    mut req: Request,
    next: Next,
) -> Response {
    let edge_req = EdgeRequest::from_parts(req.headers(), req.uri());

    match router.route(&edge_req) {
        EdgeDecision::Redirect { location } => {
            tracing::debug!(host = %edge_req.host, path = %edge_req.path, %location, "Edge redirect");
            Redirect::temporary(&location).into_response()
        }
        EdgeDecision::Rewrite { path_and_query } => match path_and_query.parse::<Uri>() {
            Ok(uri) => {
                tracing::debug!(host = %edge_req.host, from = %edge_req.path, to = %uri, "Edge rewrite");
                *req.uri_mut() = uri;
                next.run(req).await
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path_and_query, "Unusable rewrite target");
                next.run(req).await
            }
        },
        EdgeDecision::Pass => next.run(req).await,
    }
}
