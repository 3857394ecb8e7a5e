//! # image-tweak
//!
//! A small image upload and gallery service.
//!
//! Signed-in users upload one or more images together with adjustment
//! parameters (brightness, contrast, saturation, opacity, output resolution,
//! rotation and format). The bytes land in S3, one metadata record per upload
//! lands in DynamoDB, and the upload is handed to an external processing
//! function. Users can then browse, download and delete their own images.
//!
//! ## Features
//!
//! - **Multipart uploads**: a JSON `metadata` part plus up to N `files` parts
//! - **Gallery**: previews embedded as data URIs, newest upload first
//! - **Ownership checks**: every image operation verifies the owning record
//! - **Processing hand-off**: JSON POST to a configurable function endpoint
//! - **Authentication**: HMAC-SHA256 session tokens, Svix-signed webhooks
//!
//! ## Architecture
//!
//! - [`model`] - Upload records, image parameters, timestamps
//! - [`storage`] - Object and metadata stores (S3, DynamoDB, in-memory)
//! - [`processing`] - Processing request/response and the HTTP client
//! - [`gallery`] - Upload, gallery, download and delete operations
//! - [`server`] - Axum-based HTTP server, pages and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use image_tweak::{create_dev_router, ImageService, MemoryMetadataStore, MemoryObjectStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = ImageService::new(
//!         Arc::new(MemoryObjectStore::new()),
//!         Arc::new(MemoryMetadataStore::new()),
//!     );
//!     let router = create_dev_router(service);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod gallery;
pub mod model;
pub mod processing;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig, TokenOutputFormat};
pub use error::{GalleryError, ProcessingError, StoreError};
pub use gallery::{
    DeleteOutcome, DownloadedImage, ImageService, IncomingFile, ResizeTarget, UploadOutcome,
    UploadRequest, UploadedFile,
};
pub use model::{
    FilenameOverride, GalleryEntry, GalleryView, ImageParameters, OutputFormat, UploadMetadata,
    UploadRecord,
};
pub use processing::{
    HttpProcessor, ImageProcessor, ProcessingRequest, ProcessingResult, ProcessingStatus,
};
pub use server::{
    create_dev_router, create_router, health_handler, AppState, AuthError, AuthMode,
    AuthenticatedUser, ErrorResponse, HealthResponse, RouterConfig, SessionAuth, WebhookVerifier,
};
pub use storage::{
    DynamoMetadataStore, MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore,
    S3ObjectStore,
};
