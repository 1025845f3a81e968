//! Client-side session state.
//!
//! `TokenState` is the in-memory mirror of the access/refresh token pair,
//! backed by a `CookieStore` that survives reloads. It is constructed
//! explicitly (hydrated from the store) and torn down with `clear_tokens`;
//! independent sessions can coexist in one process.

pub mod refresh;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cookie::{CookieOptions, CookieStore, MemoryCookieStore, NullCookieStore};

pub use refresh::RefreshCoordinator;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
const ACCESS_TOKEN_DAYS: u32 = 7;
const REFRESH_TOKEN_DAYS: u32 = 30;

/// Keys earlier versions of the front end persisted the session under.
pub const LEGACY_KEYS: &[&str] = &["accessToken", "refreshToken", "token", "user"];

/// Access/refresh token pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Tokens {
    fn read_from(store: &dyn CookieStore) -> Self {
        Self {
            access_token: store.get(ACCESS_TOKEN_COOKIE),
            refresh_token: store.get(REFRESH_TOKEN_COOKIE),
        }
    }
}

/// In-memory token pair synchronized with a cookie store.
///
/// Every read-modify-write holds the write lock across both the memory
/// update and the cookie writes, so readers never see half a pair.
pub struct TokenState {
    store: Arc<dyn CookieStore>,
    legacy: Option<Arc<dyn CookieStore>>,
    secure: bool,
    tokens: RwLock<Tokens>,
}

impl TokenState {
    /// Build a session from whatever the store currently holds.
    pub fn hydrate(store: Arc<dyn CookieStore>, secure: bool) -> Self {
        let tokens = Tokens::read_from(store.as_ref());
        Self {
            store,
            legacy: None,
            secure,
            tokens: RwLock::new(tokens),
        }
    }

    /// Session for one incoming request, seeded from its `Cookie` header.
    ///
    /// The returned jar renders the `Set-Cookie` headers to send back.
    pub fn from_cookie_header(header: &str, secure: bool) -> (Self, Arc<MemoryCookieStore>) {
        let store = Arc::new(MemoryCookieStore::from_cookie_header(
            header,
            &[
                (ACCESS_TOKEN_COOKIE, CookieOptions::lax(ACCESS_TOKEN_DAYS, secure)),
                (REFRESH_TOKEN_COOKIE, CookieOptions::lax(REFRESH_TOKEN_DAYS, secure)),
            ],
        ));
        (Self::hydrate(store.clone(), secure), store)
    }

    /// A session with no persistent store behind it.
    pub fn detached() -> Self {
        Self::hydrate(Arc::new(NullCookieStore), false)
    }

    /// Alternate location older builds stored tokens in; purged on clear.
    pub fn with_legacy_store(mut self, legacy: Arc<dyn CookieStore>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Re-read both cookies; the store wins wherever it disagrees with memory.
    ///
    /// Called before every outbound request so a login completed elsewhere
    /// is picked up on the next call.
    pub async fn sync_tokens(&self) -> Tokens {
        if !self.store.is_available() {
            return self.tokens.read().await.clone();
        }

        let persisted = Tokens::read_from(self.store.as_ref());
        let mut tokens = self.tokens.write().await;
        if *tokens != persisted {
            tracing::debug!(
                had_access = tokens.access_token.is_some(),
                has_access = persisted.access_token.is_some(),
                "Token state resynchronized from cookie store"
            );
            *tokens = persisted;
        }
        tokens.clone()
    }

    /// Store a new access token and, when given, a new refresh token.
    pub async fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut tokens = self.tokens.write().await;

        tokens.access_token = Some(access_token.to_string());
        self.store.set(
            ACCESS_TOKEN_COOKIE,
            access_token,
            &CookieOptions::lax(ACCESS_TOKEN_DAYS, self.secure),
        );

        if let Some(refresh) = refresh_token {
            tokens.refresh_token = Some(refresh.to_string());
            self.store.set(
                REFRESH_TOKEN_COOKIE,
                refresh,
                &CookieOptions::lax(REFRESH_TOKEN_DAYS, self.secure),
            );
        }
    }

    /// Drop both tokens and every legacy copy. Returns the removal headers
    /// for cookies that existed, for forwarding in a server context.
    pub async fn clear_tokens(&self) -> Vec<String> {
        let mut tokens = self.tokens.write().await;
        *tokens = Tokens::default();

        let mut removals: Vec<String> = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
            .iter()
            .chain(LEGACY_KEYS)
            .filter_map(|name| self.store.delete(name))
            .collect();

        if let Some(legacy) = &self.legacy {
            removals.extend(LEGACY_KEYS.iter().filter_map(|name| legacy.delete(name)));
        }

        removals
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.access_token.is_some()
    }

    pub async fn snapshot(&self) -> Tokens {
        self.tokens.read().await.clone()
    }
}
