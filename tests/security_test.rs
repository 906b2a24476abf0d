//! Authorization boundary tests: the admin surface, token handling and
//! the endpoints that must stay public.

mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, TestApp};
use serde_json::json;

const ADMIN_ENDPOINTS: &[(&str, &str)] = &[
    ("GET", "/api/v1/admin/orders"),
    ("GET", "/api/v1/admin/dashboard"),
    ("GET", "/api/v1/admin/reviews"),
    ("GET", "/api/v1/admin/contacts"),
    ("GET", "/api/v1/admin/settings"),
    ("GET", "/api/v1/admin/content"),
    ("GET", "/api/v1/admin/coupons"),
    ("GET", "/api/v1/admin/orders/export"),
];

fn method_of(name: &str) -> Method {
    name.parse().expect("method name")
}

#[tokio::test]
async fn admin_surface_requires_a_bearer_token() {
    let app = TestApp::new().await;

    for (method, uri) in ADMIN_ENDPOINTS {
        let response = app.request(method_of(method), uri, None, None).await;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "unauthenticated {uri}"
        );
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "AUTH_MISSING", "{uri}");
    }

    // Mutating admin endpoints too
    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/products",
            Some(json!({ "name": "X", "sku": "X-1", "price": "100", "sizes": [] })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_tokens_cannot_reach_the_back_office() {
    let app = TestApp::new().await;
    let token = app.register_customer("shopper@example.com").await;

    for (method, uri) in ADMIN_ENDPOINTS {
        let response = app.request(method_of(method), uri, None, Some(&token)).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "customer token on {uri}"
        );
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "AUTH_INSUFFICIENT_PERMISSIONS", "{uri}");
    }

    // The same token is perfectly good for the customer surface
    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tampered_and_garbage_tokens_are_rejected() {
    let app = TestApp::new().await;

    // Flip the last character of a real admin token
    let mut tampered = app.token().to_string();
    let last = tampered.pop().expect("token is not empty");
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    let response = app
        .request(Method::GET, "/api/v1/admin/orders", None, Some(&tampered))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");

    for garbage in ["not-a-jwt", "a.b.c", ""] {
        let response = app
            .request(Method::GET, "/api/v1/admin/orders", None, Some(garbage))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {garbage:?}");
    }
}

#[tokio::test]
async fn tokens_from_a_different_signing_key_are_rejected() {
    let app = TestApp::new().await;
    let foreign = TestApp::with_config(|cfg| {
        cfg.jwt_secret = "q8WnZr0tXv5yBm2kGd7jAc4fLp9sHu3eTi6oQw1xNbEyRzUvKgMhPdSlJf8cVn2t".to_string();
    })
    .await;

    // Structurally valid admin token, wrong key for this deployment
    let response = app
        .request(Method::GET, "/api/v1/admin/orders", None, Some(foreign.token()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn status_and_health_stay_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "happy-hopz-api");

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    // A browsing shopper never needs a token
    for uri in [
        "/api/v1/products",
        "/api/v1/categories",
        "/api/v1/content",
        "/api/v1/settings",
    ] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK, "public {uri}");
    }
}

#[tokio::test]
async fn responses_carry_the_request_id_back() {
    let app = TestApp::new().await;

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/status",
            None,
            None,
            &[("x-request-id", "security-test-123")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("security-test-123")
    );

    // One is minted when the client doesn't send one
    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}
