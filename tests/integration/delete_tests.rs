//! Delete integration tests.
//!
//! Tests verify:
//! - Deleting one of several images updates the owning record
//! - Deleting the last image removes the record
//! - Other users cannot delete, and nothing is removed when they try

use axum::http::StatusCode;
use tower::ServiceExt;

use image_tweak::MetadataStore;

use super::test_utils::{
    body_json, dev_app, png_image, upload_request, user_request, MultipartBody, TestApp,
};

async fn seed_two(app: &TestApp, user: &str, extra: &str) -> String {
    let metadata = format!(
        r#"{{"imageName": ["first.png", "second.png"]{}}}"#,
        extra
    );
    let body = MultipartBody::new()
        .metadata(&metadata)
        .file("a.png", "image/png", &png_image(2, 2))
        .file("b.png", "image/png", &png_image(2, 2));

    let response = app
        .router
        .clone()
        .oneshot(upload_request(user, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["uploadId"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_delete_one_of_two_updates_record() {
    let app = dev_app();
    let upload_id = seed_two(
        &app,
        "user_a",
        r#", "imageParameters": {"overwrittenFilename": ["One", "Two"]}"#,
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(user_request("DELETE", "/api/images/first.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["key"], "first.png");
    assert_eq!(json["recordDeleted"], false);
    assert_eq!(json["remaining"], 1);

    assert!(!app.objects.contains("first.png").await);
    assert!(app.objects.contains("second.png").await);

    let record = app.metadata.get_record(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.image_name, vec!["second.png".to_string()]);
    // The override entry of the deleted image goes with it
    assert_eq!(record.display_name(0), "Two");
}

#[tokio::test]
async fn test_delete_last_image_removes_record() {
    let app = dev_app();
    let upload_id = seed_two(&app, "user_a", "").await;

    for key in ["first.png", "second.png"] {
        let response = app
            .router
            .clone()
            .oneshot(user_request("DELETE", &format!("/api/images/{}", key), "user_a"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(app.objects.is_empty().await);
    assert!(app.metadata.get_record(&upload_id).await.unwrap().is_none());

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "user_a"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["images"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_delete_reports_record_removal() {
    let app = dev_app();
    let body = MultipartBody::new()
        .metadata(r#"{"imageName": ["solo.png"]}"#)
        .file("solo.png", "image/png", &png_image(2, 2));
    app.router
        .clone()
        .oneshot(upload_request("user_a", body))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(user_request("DELETE", "/api/images/solo.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["recordDeleted"], true);
    assert_eq!(json["remaining"], 0);
    assert!(app.metadata.is_empty().await);
}

#[tokio::test]
async fn test_delete_other_users_image_forbidden() {
    let app = dev_app();
    seed_two(&app, "user_a", "").await;

    let response = app
        .router
        .oneshot(user_request("DELETE", "/api/images/first.png", "user_b"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Ownership is checked before anything is removed
    assert!(app.objects.contains("first.png").await);
    assert_eq!(app.metadata.len().await, 1);
}

#[tokio::test]
async fn test_delete_unknown_key() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(user_request("DELETE", "/api/images/ghost.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_object_store_failure_keeps_record() {
    let app = dev_app();
    let upload_id = seed_two(&app, "user_a", "").await;
    app.objects.fail_deletes(true);

    let response = app
        .router
        .oneshot(user_request("DELETE", "/api/images/first.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let record = app.metadata.get_record(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.image_name.len(), 2);
}
