//! Test utilities for integration tests.
//!
//! This module provides in-memory apps, image fixtures, a multipart body
//! builder and a stand-in processing endpoint.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tokio::sync::Mutex;

use image_tweak::{
    create_router, HttpProcessor, ImageService, MemoryMetadataStore, MemoryObjectStore,
    RouterConfig,
};

pub const BOUNDARY: &str = "----image-tweak-test-boundary";

// =============================================================================
// Apps
// =============================================================================

/// A router over in-memory stores, with handles to inspect those stores.
pub struct TestApp {
    pub router: Router,
    pub objects: MemoryObjectStore,
    pub metadata: MemoryMetadataStore,
}

/// Development-mode app (no tokens, user from `X-User-Id`).
pub fn dev_app() -> TestApp {
    app_with(RouterConfig::without_auth().with_tracing(false), |s| s)
}

/// App with a custom router configuration and service setup.
pub fn app_with(config: RouterConfig, configure: impl FnOnce(ImageService) -> ImageService) -> TestApp {
    let objects = MemoryObjectStore::new();
    let metadata = MemoryMetadataStore::new();
    let service = configure(ImageService::new(
        Arc::new(objects.clone()),
        Arc::new(metadata.clone()),
    ));

    TestApp {
        router: create_router(service, config),
        objects,
        metadata,
    }
}

/// Development-mode app that hands uploads to `endpoint`.
pub fn dev_app_with_processing(endpoint: &str, inline_images: bool) -> TestApp {
    let processor = HttpProcessor::new(endpoint, Duration::from_secs(5))
        .unwrap()
        .with_inline_images(inline_images);
    app_with(RouterConfig::without_auth().with_tracing(false), |s| {
        s.with_processor(Arc::new(processor))
    })
}

// =============================================================================
// Image fixtures
// =============================================================================

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 144, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A solid-colour PNG.
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// A solid-colour JPEG.
pub fn jpeg_image(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// Decode dimensions of an encoded image.
pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

// =============================================================================
// Requests
// =============================================================================

/// Builder for `multipart/form-data` upload bodies.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the JSON `metadata` part.
    pub fn metadata(mut self, json: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\
                 Content-Type: application/json\r\n\r\n{json}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    /// Add a `files` part.
    pub fn file(mut self, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// `POST /api/upload` as `user` in development mode.
pub fn upload_request(user: &str, body: MultipartBody) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-user-id", user)
        .body(Body::from(body.finish()))
        .unwrap()
}

/// A bodiless request as `user` in development mode.
pub fn user_request(method: &str, uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Percent-encode a key for use in a path.
pub fn key_path(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

// =============================================================================
// Processing endpoint stand-in
// =============================================================================

/// Request bodies received by the stand-in endpoint.
#[derive(Clone, Default)]
pub struct ProcessingCalls(Arc<Mutex<Vec<Value>>>);

impl ProcessingCalls {
    pub async fn bodies(&self) -> Vec<Value> {
        self.0.lock().await.clone()
    }
}

/// Serve a processing endpoint on an ephemeral port that records each
/// request body and answers with `status` and `reply`.
///
/// Returns the endpoint URL and the recorded calls.
pub async fn spawn_processing_endpoint(status: StatusCode, reply: Value) -> (String, ProcessingCalls) {
    let calls = ProcessingCalls::default();
    let recorded = calls.clone();

    let app = Router::new().route(
        "/ImageProcessing",
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            let reply = reply.clone();
            async move {
                recorded.0.lock().await.push(body);
                (status, Json(reply))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/ImageProcessing", addr), calls)
}
