//! Request/response DTOs shared by the client and the edge service.
//!
//! Field names follow the backend's camelCase JSON.

use serde::{Deserialize, Serialize};

/// POST /auth/login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/signup request body. Extra profile fields pass through.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Success body of login, signup and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// POST /auth/refresh and /auth/logout request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response. `accessToken` may be missing on a malformed reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// GET /api/api-key response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub api_key: String,
}

/// GET /api/utc-time response. `fx_dyn` is the encrypted timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct UtcTimeResponse {
    pub fx_dyn: String,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub mode: String,
}

/// Generic success response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_deserialization() {
        let json = r#"{
            "accessToken": "at-123",
            "refreshToken": "rt-456",
            "user": {"id": 7, "email": "owner@pizza.com"}
        }"#;
        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "at-123");
        assert_eq!(resp.refresh_token.as_deref(), Some("rt-456"));
        assert_eq!(resp.user.unwrap()["email"], "owner@pizza.com");
    }

    #[test]
    fn test_auth_response_requires_access_token() {
        let json = r#"{"refreshToken": "rt"}"#;
        assert!(serde_json::from_str::<AuthResponse>(json).is_err());
    }

    #[test]
    fn test_refresh_response_tolerates_missing_token() {
        let resp: RefreshResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.access_token.is_none());
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn test_refresh_request_is_camel_case() {
        let json = serde_json::to_value(RefreshRequest {
            refresh_token: "rt".into(),
        })
        .unwrap();
        assert_eq!(json["refreshToken"], "rt");
    }

    #[test]
    fn test_signup_request_flattens_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("restaurantName".into(), serde_json::json!("Pizza Place"));
        let json = serde_json::to_value(SignupRequest {
            name: "Owner".into(),
            email: "owner@pizza.com".into(),
            password: "pw".into(),
            extra,
        })
        .unwrap();
        assert_eq!(json["restaurantName"], "Pizza Place");
        assert_eq!(json["email"], "owner@pizza.com");
    }

    #[test]
    fn test_api_key_response_field_name() {
        let json = serde_json::to_value(ApiKeyResponse {
            api_key: "k".into(),
        })
        .unwrap();
        assert_eq!(json["apiKey"], "k");
    }
}
