//! Error types for the request pipeline and the edge service.
//!
//! `ApiError` is what callers of the request pipeline see. `AppError` maps
//! edge-service failures onto HTTP status + JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Message surfaced for any transport-level failure.
pub const CONNECTION_MESSAGE: &str =
    "Unable to connect to the server. Please check your internet connection.";

/// Failures of an authorized API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The refresh attempt failed or produced no usable token. Tokens are
    /// already cleared when this is returned.
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("{}", CONNECTION_MESSAGE)]
    Connection(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status of the failed call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Connectivity problems are the only retryable class.
    pub fn is_connection(&self) -> bool {
        matches!(self, ApiError::Connection(_))
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

/// Why a refresh cycle failed. Cloneable so one outcome can be handed to
/// every waiter of the shared refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("refresh endpoint rejected the token with status {0}")]
    Rejected(u16),

    #[error("refresh response did not contain an access token")]
    MissingAccessToken,

    #[error("refresh endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("refresh timed out")]
    TimedOut,
}

impl From<RefreshFailure> for ApiError {
    fn from(_: RefreshFailure) -> Self {
        ApiError::SessionExpired
    }
}

/// Edge-service errors with Axum response mapping.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to sign API key")]
    Signing(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Signing(detail) => {
                tracing::error!(error = %detail, "API key signing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Failed to sign API key"}),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<crate::signer::CryptoError> for AppError {
    fn from(e: crate::signer::CryptoError) -> Self {
        AppError::Signing(e.to_string())
    }
}
