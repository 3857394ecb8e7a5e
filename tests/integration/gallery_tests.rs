//! Gallery, preview and download integration tests.
//!
//! Tests verify:
//! - Galleries list only the caller's images, newest upload first
//! - Previews and downloads are served with the right headers
//! - Other users' images are refused
//! - Missing objects degrade to unavailable gallery entries

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine};
use tower::ServiceExt;

use super::test_utils::{
    body_bytes, body_json, body_text, dev_app, key_path, png_image, upload_request,
    user_request, MultipartBody, TestApp,
};

/// Upload `files` for `user` with explicit keys and a start time.
async fn seed(app: &TestApp, user: &str, start_time: &str, keys: &[&str], extra: &str) {
    let names: Vec<String> = keys.iter().map(|k| format!("\"{}\"", k)).collect();
    let metadata = format!(
        r#"{{"startTime": "{}", "imageName": [{}]{}}}"#,
        start_time,
        names.join(","),
        extra
    );

    let mut body = MultipartBody::new().metadata(&metadata);
    for _ in keys {
        body = body.file("upload.png", "image/png", &png_image(3, 3));
    }

    let response = app
        .router
        .clone()
        .oneshot(upload_request(user, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Gallery
// =============================================================================

#[tokio::test]
async fn test_gallery_lists_own_images_newest_first() {
    let app = dev_app();
    seed(&app, "user_a", "1.2.2026_10:0:0", &["old.png"], "").await;
    seed(&app, "user_a", "15.2.2026_8:0:0", &["new-1.png", "new-2.png"], "").await;
    seed(&app, "user_b", "20.2.2026_8:0:0", &["other.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let images = json["images"].as_array().unwrap();
    let keys: Vec<&str> = images.iter().map(|i| i["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["new-1.png", "new-2.png", "old.png"]);

    let first = &images[0];
    assert_eq!(first["available"], true);
    assert_eq!(first["contentType"], "image/png");
    assert_eq!(first["startTime"], "15.2.2026_8:0:0");
    let decoded = STANDARD.decode(first["content"].as_str().unwrap()).unwrap();
    assert_eq!(decoded, png_image(3, 3));
}

#[tokio::test]
async fn test_gallery_empty_for_new_user() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "nobody"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["images"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_gallery_marks_missing_objects_unavailable() {
    let app = dev_app();
    seed(&app, "user_a", "1.2.2026_10:0:0", &["kept.png", "lost.png"], "").await;
    image_tweak::ObjectStore::delete_object(&app.objects, "lost.png")
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let images = json["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["available"], true);
    assert_eq!(images[1]["key"], "lost.png");
    assert_eq!(images[1]["available"], false);
    assert_eq!(images[1]["content"], "");
}

#[tokio::test]
async fn test_gallery_display_names_use_override() {
    let app = dev_app();
    seed(
        &app,
        "user_a",
        "1.2.2026_10:0:0",
        &["k1.png", "k2.png"],
        r#", "imageParameters": {"overwrittenFilename": ["Beach day", ""]}"#,
    )
    .await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/gallery", "user_a"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["images"][0]["displayName"], "Beach day");
    assert_eq!(json["images"][1]["displayName"], "k2.png");
}

#[tokio::test]
async fn test_uploads_listing() {
    let app = dev_app();
    seed(&app, "user_a", "1.1.2026_0:0:0", &["a.png"], "").await;
    seed(&app, "user_a", "2.1.2026_0:0:0", &["b.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/uploads", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let uploads = json["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0]["imageName"][0], "b.png");
    assert_eq!(uploads[1]["imageName"][0], "a.png");
}

// =============================================================================
// Preview and download
// =============================================================================

#[tokio::test]
async fn test_preview_served_inline() {
    let app = dev_app();
    seed(&app, "user_a", "1.1.2026_0:0:0", &["photo.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/images/photo.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert!(headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("inline;"));
    assert_eq!(headers.get("cache-control").unwrap(), "private, max-age=300");

    assert_eq!(body_bytes(response).await, png_image(3, 3));
}

#[tokio::test]
async fn test_download_served_as_attachment_with_original_name() {
    let app = dev_app();
    let key = "0b3c2f9e-8d8a-4a51-9b3e-7f4f8c1d2e3a_Größe.png";
    seed(&app, "user_a", "1.1.2026_0:0:0", &[key], "").await;

    let response = app
        .router
        .oneshot(user_request(
            "GET",
            &format!("/api/download/{}", key_path(key)),
            "user_a",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("filename=\"Gr__e.png\""));
    assert!(disposition.contains("filename*=UTF-8''Gr%C3%B6%C3%9Fe.png"));
}

#[tokio::test]
async fn test_preview_of_other_users_image_forbidden() {
    let app = dev_app();
    seed(&app, "user_a", "1.1.2026_0:0:0", &["private.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/images/private.png", "user_b"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");
}

#[tokio::test]
async fn test_preview_unknown_key_not_found() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(user_request("GET", "/api/download/missing.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_preview_key_with_slashes() {
    let app = dev_app();
    seed(&app, "user_a", "1.1.2026_0:0:0", &["albums/2026/cat.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/api/images/albums/2026/cat.png", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_gallery_page_renders_cards() {
    let app = dev_app();
    seed(&app, "user_a", "1.1.2026_0:0:0", &["one.png", "two.png"], "").await;

    let response = app
        .router
        .oneshot(user_request("GET", "/gallery", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Your gallery (2)"));
    assert!(html.contains("data:image/png;base64,"));
    assert!(html.contains("/api/download/one.png?user=user_a"));
}

#[tokio::test]
async fn test_upload_page_renders_form() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(user_request("GET", "/upload", "user_a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("<form"));
    assert!(html.contains("/api/upload?"));
}

#[tokio::test]
async fn test_health_is_public() {
    let app = dev_app();

    let response = app
        .router
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}
