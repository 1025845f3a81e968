//! Fallback for page routes.
//!
//! Page rendering lives elsewhere; this reports which internal route the
//! edge resolved a request to.

use axum::Json;
use axum::extract::OriginalUri;
use axum::http::Uri;
use serde_json::{Value, json};

pub async fn resolved_page(uri: Uri, OriginalUri(original): OriginalUri) -> Json<Value> {
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    let menu = match segments.as_slice() {
        [locale, "menu", slug] => json!({ "locale": locale, "slug": slug }),
        _ => Value::Null,
    };

    Json(json!({
        "path": uri.path(),
        "query": uri.query(),
        "requested": original.path(),
        "menu": menu,
    }))
}
