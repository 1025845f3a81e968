//! Login, signup, logout and current-user on top of the request pipeline.

use serde_json::Value;

use super::{ApiClient, LOGOUT_ENDPOINT, RequestOptions};
use crate::auth_event::{self, AuthActivity};
use crate::error::ApiError;
use crate::types::{AuthResponse, LoginRequest, RefreshRequest, SignupRequest};

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const SIGNUP_ENDPOINT: &str = "/auth/signup";
pub const ME_ENDPOINT: &str = "/auth/me";

impl ApiClient {
    /// Exchange credentials for a session. Tokens are stored on success.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let result = self
            .request::<AuthResponse>(LOGIN_ENDPOINT, RequestOptions::post().json(credentials))
            .await;
        self.open_session(AuthActivity::Login, &credentials.email, result)
            .await
    }

    /// Register an account and start its session.
    pub async fn signup(&self, payload: &SignupRequest) -> Result<AuthResponse, ApiError> {
        let result = self
            .request::<AuthResponse>(SIGNUP_ENDPOINT, RequestOptions::post().json(payload))
            .await;
        self.open_session(AuthActivity::Signup, &payload.email, result)
            .await
    }

    async fn open_session(
        &self,
        activity: AuthActivity,
        email: &str,
        result: Result<AuthResponse, ApiError>,
    ) -> Result<AuthResponse, ApiError> {
        match result {
            Ok(auth) => {
                self.tokens()
                    .set_tokens(&auth.access_token, auth.refresh_token.as_deref())
                    .await;
                auth_event::emit(activity, true, Some(email), "Session established");
                tracing::info!(activity = activity.name(), "Session established");
                Ok(auth)
            }
            Err(e) => {
                auth_event::emit(activity, false, Some(email), &e.to_string());
                Err(e)
            }
        }
    }

    /// End the session. Never fails: the server call is best effort and the
    /// local tokens are always cleared. Safe to call without a session.
    ///
    /// Returns the removal `Set-Cookie` headers for cookies that existed.
    pub async fn logout(&self) -> Vec<String> {
        let refresh_token = self.tokens().sync_tokens().await.refresh_token;

        let options = match refresh_token {
            Some(refresh_token) => RequestOptions::post().json(&RefreshRequest { refresh_token }),
            None => RequestOptions::post(),
        };
        // The pipeline resolves logout successfully whatever the server says.
        let _ = self.request::<Value>(LOGOUT_ENDPOINT, options).await;

        let removals = self.tokens().clear_tokens().await;
        auth_event::emit(AuthActivity::Logout, true, None, "Session cleared");
        removals
    }

    /// The signed-in user, or `None` when there is no session.
    pub async fn current_user(&self) -> Result<Option<Value>, ApiError> {
        if self.tokens().sync_tokens().await.access_token.is_none() {
            return Ok(None);
        }
        let user = self
            .request::<Value>(ME_ENDPOINT, RequestOptions::get())
            .await?;
        Ok(Some(user))
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens().sync_tokens().await.access_token.is_some()
    }
}
