//! HTTP route handlers.

pub mod api_key;
pub mod health;
pub mod page;
pub mod utc_time;
