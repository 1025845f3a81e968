//! Integration tests for the edge service.
//!
//! Uses Tower's `oneshot()` to test the full Axum app including the edge
//! routing middleware.

mod common;

use axum::http::StatusCode;
use axum::http::header::LOCATION;
use common::{body_json, build_test_app, build_test_app_with_config, get_with_host};
use menu_auth::config::Config;
use tower::ServiceExt;

// ───── GET /health ─────

#[tokio::test]
async fn test_health() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("localhost:3000", "/health"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "development");
}

#[tokio::test]
async fn test_health_reports_production() {
    let mut config = Config::test_default();
    config.production = true;
    let (app, _state) = build_test_app_with_config(config);

    let resp = app
        .oneshot(get_with_host("mysite.com", "/health"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["mode"], "production");
}

// ───── GET /api/api-key ─────

#[tokio::test]
async fn test_api_key_is_openable_with_passphrase() {
    let (app, state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("localhost:3000", "/api/api-key"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let body = body_json(resp).await;
    let key = body["apiKey"].as_str().unwrap();

    let (prefix, ts) = state.signer.open(key).unwrap();
    assert_eq!(prefix, "menu-client");
    assert!((ts - state.signer.local_time()).abs() < 60.0);
}

#[tokio::test]
async fn test_api_key_fresh_per_call() {
    let (app, _state) = build_test_app();

    let first = app
        .clone()
        .oneshot(get_with_host("localhost:3000", "/api/api-key"))
        .await
        .unwrap();
    let second = app
        .oneshot(get_with_host("localhost:3000", "/api/api-key"))
        .await
        .unwrap();

    assert_ne!(body_json(first).await["apiKey"], body_json(second).await["apiKey"]);
}

#[tokio::test]
async fn test_api_key_served_on_menu_subdomain() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("pizza.mysite.com", "/api/api-key"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["apiKey"].is_string());
}

// ───── GET /api/utc-time ─────

#[tokio::test]
async fn test_utc_time_decrypts_to_server_time() {
    let (app, state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("localhost:3000", "/api/utc-time"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let ts = state
        .signer
        .decrypt_timestamp(body["fx_dyn"].as_str().unwrap())
        .unwrap();
    assert!((ts - state.signer.local_time()).abs() < 60.0);
}

// ───── edge routing ─────

#[tokio::test]
async fn test_main_domain_menu_path_redirects() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("mysite.com", "/en/menu/pizza"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers()[LOCATION],
        "https://pizza.mysite.com/en/menu/pizza"
    );
}

#[tokio::test]
async fn test_subdomain_menu_path_served_directly() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("pizza.mysite.com", "/en/menu/pizza"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["path"], "/en/menu/pizza");
    assert_eq!(body["menu"]["slug"], "pizza");
    assert_eq!(body["menu"]["locale"], "en");
}

#[tokio::test]
async fn test_subdomain_root_rewritten_internally() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("pizza.mysite.com", "/?table=3"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["path"], "/ar/menu/pizza");
    assert_eq!(body["query"], "table=3");
}

#[tokio::test]
async fn test_preview_on_dashboard_is_not_redirected() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host(
            "dashboard.mysite.com",
            "/en/menu/pizza?preview=true",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["path"], "/en/menu/pizza");
}

#[tokio::test]
async fn test_static_paths_not_rewritten_on_subdomain() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("pizza.mysite.com", "/_next/chunk.js"))
        .await
        .unwrap();

    assert_eq!(body_json(resp).await["path"], "/_next/chunk.js");
}

#[tokio::test]
async fn test_localhost_redirect_uses_http_and_port() {
    let (app, _state) = build_test_app();

    let resp = app
        .oneshot(get_with_host("localhost:3000", "/ar/menu/burger"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers()[LOCATION],
        "http://burger.localhost:3000/ar/menu/burger"
    );
}
