//! In-memory cookie store.
//!
//! Uses `DashMap` for concurrent access without external locks. Each entry
//! keeps the attributes it was written with and its absolute expiry.

use dashmap::{DashMap, DashSet};
use std::time::{Duration, Instant};

use super::{CookieOptions, CookieStore, parse_cookie_header, removal_header, set_cookie_header};

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    options: CookieOptions,
    expires_at: Instant,
}

/// Process-local cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: DashMap<String, StoredCookie>,
    /// Names written through `set` since the store was seeded.
    dirty: DashSet<String>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from an incoming `Cookie` request header.
    ///
    /// Only the cookies named in `tracked` are kept, each with its own
    /// attributes since the header carries none. Seeded entries are not
    /// echoed by `set_cookie_headers` until they are written again.
    pub fn from_cookie_header(header: &str, tracked: &[(&str, CookieOptions)]) -> Self {
        let store = Self::new();
        for (name, value) in parse_cookie_header(header) {
            if let Some((_, options)) = tracked.iter().find(|(n, _)| *n == name) {
                store.insert(name, value, options);
            }
        }
        store
    }

    fn insert(&self, name: &str, value: &str, options: &CookieOptions) {
        let expires_at = Instant::now() + Duration::from_secs(options.max_age_secs());
        self.cookies.insert(
            name.to_string(),
            StoredCookie {
                value: value.to_string(),
                options: options.clone(),
                expires_at,
            },
        );
    }

    /// Attributes `name` was written with.
    pub fn options(&self, name: &str) -> Option<CookieOptions> {
        self.cookies.get(name).map(|e| e.value().options.clone())
    }

    /// `Set-Cookie` headers for every live cookie written since seeding,
    /// for forwarding a jar built from a request back onto its response.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let now = Instant::now();
        let mut headers: Vec<String> = self
            .cookies
            .iter()
            .filter(|e| e.value().expires_at > now && self.dirty.contains(e.key()))
            .map(|e| set_cookie_header(e.key(), &e.value().value, &e.value().options))
            .collect();
        headers.sort();
        headers
    }

    /// Number of cookies currently stored (including expired).
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        let now = Instant::now();
        if self
            .cookies
            .remove_if(name, |_, c| c.expires_at <= now)
            .is_some()
        {
            return None;
        }
        self.cookies.get(name).map(|e| e.value().value.clone())
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) {
        self.insert(name, value, options);
        self.dirty.insert(name.to_string());
    }

    fn delete(&self, name: &str) -> Option<String> {
        self.dirty.remove(name);
        self.cookies
            .remove(name)
            .map(|(name, cookie)| removal_header(&name, &cookie.options))
    }
}
