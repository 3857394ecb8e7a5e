//! Webhook integration tests.
//!
//! Tests verify:
//! - Signed events are acknowledged
//! - Bad signatures, stale timestamps and missing headers are rejected
//! - The route only exists when a webhook secret is configured

use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use image_tweak::{RouterConfig, WebhookVerifier};

use super::test_utils::{app_with, body_json, dev_app, TestApp};

// base64("test-webhook-secret")
const SECRET: &str = "whsec_dGVzdC13ZWJob29rLXNlY3JldA==";
const BODY: &str = r#"{"type":"user.created","data":{"id":"user_2abc","email_addresses":[]}}"#;

fn webhook_app() -> TestApp {
    app_with(
        RouterConfig::without_auth()
            .with_tracing(false)
            .with_webhook_secret(SECRET)
            .unwrap(),
        |s| s,
    )
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn webhook_request(timestamp: i64, signature: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/auth")
        .header("content-type", "application/json")
        .header("svix-id", "msg_2xyz")
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_signed_event_acknowledged() {
    let app = webhook_app();
    let ts = now();
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, BODY.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(ts, &signature, BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn test_any_listed_signature_may_match() {
    let app = webhook_app();
    let ts = now();
    let good = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, BODY.as_bytes());
    let stale = WebhookVerifier::new("whsec_b3RoZXItc2VjcmV0")
        .unwrap()
        .sign("msg_2xyz", ts, BODY.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(ts, &format!("{} {}", stale, good), BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_event_type_acknowledged() {
    let app = webhook_app();
    let body = r#"{"type":"session.ended","data":{}}"#;
    let ts = now();
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, body.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(ts, &signature, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let app = webhook_app();
    let ts = now();
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, BODY.as_bytes());
    let tampered = BODY.replace("user_2abc", "user_evil");

    let response = app
        .router
        .oneshot(webhook_request(ts, &signature, &tampered))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_signature");
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let app = webhook_app();
    let ts = now() - 3600;
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, BODY.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(ts, &signature, BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extreme_timestamp_rejected() {
    let app = webhook_app();
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", i64::MIN, BODY.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(i64::MIN, &signature, BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_signature");
    assert!(json["message"].as_str().unwrap().contains("tolerance"));
}

#[tokio::test]
async fn test_missing_headers_rejected() {
    let app = webhook_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/auth")
                .body(Body::from(BODY))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_garbage_is_invalid_payload() {
    let app = webhook_app();
    let body = "not json";
    let ts = now();
    let signature = WebhookVerifier::new(SECRET)
        .unwrap()
        .sign("msg_2xyz", ts, body.as_bytes());

    let response = app
        .router
        .oneshot(webhook_request(ts, &signature, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_payload");
}

#[tokio::test]
async fn test_route_absent_without_secret() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(webhook_request(now(), "v1,abc", BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
