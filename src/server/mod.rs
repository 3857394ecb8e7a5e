//! HTTP server layer for image-tweak.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      /api/upload  /api/gallery  /api/images/{*key}  pages       │
//! │                                                                 │
//! │  ┌───────────┐  ┌───────────────┐  ┌─────────┐  ┌───────────┐   │
//! │  │ handlers  │  │     auth      │  │ webhook │  │  routes   │   │
//! │  │ + views   │  │ (session/dev) │  │ (svix)  │  │ (router)  │   │
//! │  └───────────┘  └───────────────┘  └─────────┘  └───────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                        ImageService
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod views;
pub mod webhook;

pub use auth::{
    require_auth, resolve_auth, AuthError, AuthMode, AuthenticatedUser, MaybeUser, SessionAuth,
    DEV_USER,
};
pub use handlers::{
    health_handler, AppState, DeleteResponse, ErrorResponse, HealthResponse, ReprocessResponse,
    UploadResponse, UploadsResponse,
};
pub use routes::{create_dev_router, create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use webhook::{WebhookError, WebhookEvent, WebhookVerifier};
