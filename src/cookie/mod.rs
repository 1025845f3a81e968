//! Client-side cookie storage.
//!
//! Provides the `CookieStore` trait, the attribute set a cookie is written
//! with, and `Set-Cookie` rendering. Stores remember the attributes each
//! cookie was created with, so deletion emits exactly one matching removal.

pub mod memory;

use std::fmt;

pub use memory::MemoryCookieStore;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

/// Attributes a cookie is written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub days: u32,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    /// `Path=/; SameSite=Lax`, secure only when asked.
    pub fn lax(days: u32, secure: bool) -> Self {
        Self {
            days,
            path: "/".into(),
            secure,
            same_site: SameSite::Lax,
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        u64::from(self.days) * 24 * 3600
    }
}

/// Named string values with expiry.
///
/// Implementations must never fail: a store without a backing context
/// answers `None` and ignores writes.
pub trait CookieStore: Send + Sync {
    /// Current value, `None` if absent or expired.
    fn get(&self, name: &str) -> Option<String>;

    /// Persist `value` under `name` until `now + options.days`.
    fn set(&self, name: &str, value: &str, options: &CookieOptions);

    /// Remove `name`. Returns the removal `Set-Cookie` header built from the
    /// attributes the cookie was created with, if it existed.
    fn delete(&self, name: &str) -> Option<String>;

    /// Whether a persistent context backs this store. When `false`, readers
    /// must not treat an absent cookie as authoritative.
    fn is_available(&self) -> bool {
        true
    }
}

/// Store used when there is no persistent-storage context at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCookieStore;

impl CookieStore for NullCookieStore {
    fn get(&self, _name: &str) -> Option<String> {
        None
    }

    fn set(&self, _name: &str, _value: &str, _options: &CookieOptions) {}

    fn delete(&self, _name: &str) -> Option<String> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Render a `Set-Cookie` header value.
pub fn set_cookie_header(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut parts = vec![
        format!("{name}={value}"),
        format!("Max-Age={}", options.max_age_secs()),
        format!("Path={}", options.path),
        format!("SameSite={}", options.same_site),
    ];
    if options.secure {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Render the removal header matching a cookie written with `options`.
pub fn removal_header(name: &str, options: &CookieOptions) -> String {
    let mut parts = vec![
        format!("{name}="),
        "Max-Age=0".into(),
        format!("Path={}", options.path),
        format!("SameSite={}", options.same_site),
    ];
    if options.secure {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Split a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split(';').filter_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        if name.is_empty() {
            None
        } else {
            Some((name, value))
        }
    })
}
