//! Authentication integration tests.
//!
//! Tests verify:
//! - Valid session tokens work from the header and the query string
//! - Expired, tampered and malformed tokens are rejected
//! - Pages render a sign-in notice instead of failing
//! - Development mode takes the user from the request

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use image_tweak::{RouterConfig, SessionAuth};

use super::test_utils::{
    app_with, body_json, body_text, dev_app, png_image, upload_request, user_request,
    MultipartBody, BOUNDARY,
};

const TEST_SECRET: &str = "test-secret-key-for-hmac-signing";

fn token_app() -> super::test_utils::TestApp {
    app_with(RouterConfig::new(TEST_SECRET).with_tracing(false), |s| s)
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

// =============================================================================
// Valid tokens
// =============================================================================

#[tokio::test]
async fn test_bearer_token_succeeds() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue("user_a", Duration::from_secs(3600));

    let response = app
        .router
        .oneshot(
            get("/api/uploads")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_query_token_succeeds() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue("user_a", Duration::from_secs(3600));

    let response = app
        .router
        .oneshot(
            get(&format!("/api/gallery?token={}", urlencoding::encode(&token)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_user_owns_upload() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue("user_a", Duration::from_secs(3600));

    let body = MultipartBody::new().file("a.png", "image/png", &png_image(2, 2));
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body.finish()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["metadata"]["user"], "user_a");
}

// =============================================================================
// Rejected tokens
// =============================================================================

#[tokio::test]
async fn test_missing_token() {
    let app = token_app();

    let response = app
        .router
        .oneshot(get("/api/gallery").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing_token");
}

#[tokio::test]
async fn test_expired_token() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue_with_expiry("user_a", 1_000);

    let response = app
        .router
        .oneshot(
            get("/api/gallery")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "session_expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret() {
    let app = token_app();
    let token = SessionAuth::new("some-other-secret").issue("user_a", Duration::from_secs(3600));

    let response = app
        .router
        .oneshot(
            get("/api/gallery")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_signature");
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_token_with_swapped_user() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue("user_a", Duration::from_secs(3600));
    let forged = token.replacen("user_a", "user_b", 1);

    let response = app
        .router
        .oneshot(
            get("/api/gallery")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_token() {
    let app = token_app();

    let response = app
        .router
        .oneshot(
            get("/api/gallery")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "malformed_token");
}

#[tokio::test]
async fn test_dev_header_ignored_when_tokens_required() {
    let app = token_app();

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_pages_render_for_anonymous_visitors() {
    let app = token_app();

    for (uri, action) in [("/upload", "upload images"), ("/gallery", "view your gallery")] {
        let response = app
            .router
            .clone()
            .oneshot(get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Please sign in"));
        assert!(html.contains(action));
    }
}

#[tokio::test]
async fn test_page_links_carry_token() {
    let app = token_app();
    let token = SessionAuth::new(TEST_SECRET).issue("user_a", Duration::from_secs(3600));

    let response = app
        .router
        .oneshot(
            get("/gallery")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Your gallery (0)"));
    assert!(html.contains(&format!("token={}", token)));
}

// =============================================================================
// Development mode
// =============================================================================

#[tokio::test]
async fn test_dev_mode_user_from_query() {
    let app = dev_app();

    let body = MultipartBody::new().file("a.png", "image/png", &png_image(2, 2));
    let response = app
        .router
        .clone()
        .oneshot(upload_request("alice", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/uploads?user=alice").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["uploads"].as_array().unwrap().len(), 1);

    // No user named: the default development user, who owns nothing here
    let response = app
        .router
        .oneshot(get("/api/uploads").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["uploads"].as_array().unwrap().len(), 0);
}
