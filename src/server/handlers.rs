//! HTTP request handlers for the image-tweak API and pages.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/upload` - Multipart upload (`metadata` JSON part + `files` parts)
//! - `GET /api/gallery` - The user's images with inline content
//! - `GET /api/uploads` - The user's upload records
//! - `POST /api/uploads/{upload_id}/process` - Re-trigger processing
//! - `GET /api/images/{*key}` - Inline preview
//! - `DELETE /api/images/{*key}` - Delete an image
//! - `GET /api/download/{*key}` - Attachment download
//! - `GET /`, `/upload`, `/gallery` - HTML pages

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{GalleryError, StoreError};
use crate::gallery::{
    DeleteOutcome, DownloadedImage, ImageService, IncomingFile, UploadOutcome, UploadRequest,
};
use crate::model::{GalleryView, UploadMetadata, UploadRecord};
use crate::processing::ProcessingStatus;

use super::auth::{AuthenticatedUser, MaybeUser};
use super::views;

/// Multipart field holding the upload metadata JSON.
pub const METADATA_FIELD: &str = "metadata";

/// Multipart field holding the files.
pub const FILES_FIELD: &str = "files";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ImageService>,

    /// Cache-Control max-age for image responses, in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(service: ImageService) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age: 300,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "too_many_files")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from the upload endpoint.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

/// Response from the uploads listing endpoint.
#[derive(Debug, Serialize)]
pub struct UploadsResponse {
    pub uploads: Vec<UploadRecord>,
}

/// Response from the delete endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub key: String,

    /// Whether the owning record was removed with its last image
    pub record_deleted: bool,

    /// Images left in the owning record
    pub remaining: usize,
}

/// Response from the reprocess endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessResponse {
    pub upload_id: String,
    pub processing: ProcessingStatus,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GalleryError to an HTTP response.
///
/// 5xx errors are logged at ERROR, 404s at DEBUG and other 4xx at WARN.
impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GalleryError::InvalidMultipart(_) => (StatusCode::BAD_REQUEST, "invalid_multipart"),
            GalleryError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            GalleryError::InvalidMetadata(_) => (StatusCode::BAD_REQUEST, "invalid_metadata"),
            GalleryError::NoFiles => (StatusCode::BAD_REQUEST, "no_files"),
            GalleryError::TooManyFiles { .. } => (StatusCode::BAD_REQUEST, "too_many_files"),
            GalleryError::FileCountMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "file_count_mismatch")
            }
            GalleryError::UserMismatch => (StatusCode::FORBIDDEN, "user_mismatch"),
            GalleryError::InvalidParameters(_) => (StatusCode::BAD_REQUEST, "invalid_parameters"),
            GalleryError::UnsupportedImage { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_image")
            }
            GalleryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GalleryError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            GalleryError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            GalleryError::Store(StoreError::Connection(_)) => {
                (StatusCode::BAD_GATEWAY, "connection_error")
            }
            GalleryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

fn multipart_error(e: MultipartError) -> GalleryError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GalleryError::PayloadTooLarge(e.body_text())
    } else {
        GalleryError::InvalidMultipart(e.body_text())
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Read an upload request from a multipart body.
///
/// The `metadata` part is optional JSON; every `files` part is a file. Other
/// parts are ignored.
pub async fn read_upload_request(mut multipart: Multipart) -> Result<UploadRequest, GalleryError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(METADATA_FIELD) => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    request.metadata = serde_json::from_str::<UploadMetadata>(&text)
                        .map_err(|e| GalleryError::InvalidMetadata(e.to_string()))?;
                }
            }
            Some(FILES_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                request.files.push(IncomingFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Ok(request)
}

/// Handle `POST /api/upload`.
///
/// # Response
///
/// - `200 OK`: upload id, stored files, the record and the processing status
/// - `400 Bad Request`: missing files, too many files, bad metadata or parameters
/// - `403 Forbidden`: metadata names another user
/// - `413 Payload Too Large`: body over the upload limit
/// - `415 Unsupported Media Type`: a file is not a PNG, JPEG or WebP image
/// - `500 Internal Server Error`: storage failure
pub async fn upload_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, GalleryError> {
    let request = read_upload_request(multipart).await?;
    let outcome = state.service.upload(&user.user_id, request).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Files uploaded successfully".to_string(),
        outcome,
    }))
}

/// Handle `GET /api/gallery`.
pub async fn gallery_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<GalleryView>, GalleryError> {
    Ok(Json(state.service.gallery(&user.user_id).await?))
}

/// Handle `GET /api/uploads`.
pub async fn uploads_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UploadsResponse>, GalleryError> {
    let uploads = state.service.list_uploads(&user.user_id).await?;
    Ok(Json(UploadsResponse { uploads }))
}

/// Handle `POST /api/uploads/{upload_id}/process`.
pub async fn reprocess_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(upload_id): Path<String>,
) -> Result<Json<ReprocessResponse>, GalleryError> {
    let processing = state.service.reprocess(&user.user_id, &upload_id).await?;
    Ok(Json(ReprocessResponse {
        upload_id,
        processing,
    }))
}

/// Handle `GET /api/images/{*key}`: the image, served inline.
pub async fn image_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key): Path<String>,
) -> Result<Response, GalleryError> {
    let image = state.service.fetch_image(&user.user_id, &key).await?;
    Ok(image_response(image, "inline", state.cache_max_age))
}

/// Handle `GET /api/download/{*key}`: the image, served as an attachment.
pub async fn download_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key): Path<String>,
) -> Result<Response, GalleryError> {
    let image = state.service.fetch_image(&user.user_id, &key).await?;
    Ok(image_response(image, "attachment", state.cache_max_age))
}

/// Handle `DELETE /api/images/{*key}`.
pub async fn delete_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, GalleryError> {
    let outcome = state.service.delete_image(&user.user_id, &key).await?;

    let (record_deleted, remaining) = match outcome {
        DeleteOutcome::RecordDeleted => (true, 0),
        DeleteOutcome::RecordUpdated { remaining } => (false, remaining),
    };

    Ok(Json(DeleteResponse {
        success: true,
        key,
        record_deleted,
        remaining,
    }))
}

fn image_response(image: DownloadedImage, disposition: &str, max_age: u32) -> Response {
    (
        [
            (header::CONTENT_TYPE, image.content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(disposition, &image.display_name),
            ),
            (header::CACHE_CONTROL, format!("private, max-age={}", max_age)),
        ],
        image.data,
    )
        .into_response()
}

/// `Content-Disposition` value with an ASCII fallback and a UTF-8 `filename*`.
pub fn content_disposition(disposition: &str, file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition,
        fallback,
        urlencoding::encode(file_name)
    )
}

// =============================================================================
// Pages
// =============================================================================

/// Handle `GET /`.
pub async fn landing_page_handler(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(views::landing_page(user.as_ref()))
}

/// Handle `GET /upload`.
pub async fn upload_page_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Html<String> {
    Html(views::upload_page(user.as_ref(), state.service.max_files()))
}

/// Handle `GET /gallery`.
pub async fn gallery_page_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, GalleryError> {
    let Some(user) = user else {
        return Ok(Html(views::gallery_page(None, &GalleryView::default())));
    };

    let view = state.service.gallery(&user.user_id).await?;
    Ok(Html(views::gallery_page(Some(&user), &view)))
}

// =============================================================================
// Tests
// =============================================================================
