//! Structured authentication lifecycle events.
//!
//! Events follow the OCSF Authentication class (3001) and are emitted via
//! `tracing::info!` as a single JSON line under the `auth_event` target.
//! Never panics; a payload that fails to serialize is dropped.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGON: u32 = 1;
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_SERVICE_TICKET: u32 = 4; // Token refresh
pub const ACTIVITY_OTHER: u32 = 99; // Registration

pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;

/// Lifecycle step being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthActivity {
    Login,
    Signup,
    Logout,
    TokenRefresh,
}

impl AuthActivity {
    fn id(self) -> u32 {
        match self {
            AuthActivity::Login => ACTIVITY_LOGON,
            AuthActivity::Logout => ACTIVITY_LOGOFF,
            AuthActivity::TokenRefresh => ACTIVITY_SERVICE_TICKET,
            AuthActivity::Signup => ACTIVITY_OTHER,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthActivity::Login => "Logon",
            AuthActivity::Logout => "Logoff",
            AuthActivity::TokenRefresh => "Service Ticket",
            AuthActivity::Signup => "Registration",
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        _ => "Unknown",
    }
}

/// Build the event payload without emitting it.
pub fn build_event(
    activity: AuthActivity,
    success: bool,
    user_email: Option<&str>,
    message: &str,
) -> serde_json::Value {
    let (status_id, status) = if success {
        (STATUS_SUCCESS, "Success")
    } else {
        (STATUS_FAILURE, "Failure")
    };
    // A failed refresh ends the session; a failed login is routine.
    let severity_id = match (success, activity) {
        (true, _) => SEVERITY_INFORMATIONAL,
        (false, AuthActivity::TokenRefresh) => SEVERITY_MEDIUM,
        (false, _) => SEVERITY_LOW,
    };

    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity.id(),
        "activity_name": activity.name(),
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status,
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        },
        "message": message,
    });

    if let Some(email) = user_email {
        event["actor"] = json!({
            "user": {
                "email_addr": email,
                "type_id": 1,
                "type": "User"
            }
        });
    }

    event
}

/// Emit an authentication event.
pub fn emit(activity: AuthActivity, success: bool, user_email: Option<&str>, message: &str) {
    let event = build_event(activity, success, user_email, message);
    if let Ok(json) = serde_json::to_string(&event) {
        tracing::info!(target: "auth_event", "{}", json);
    }
}
