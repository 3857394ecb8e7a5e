//! Router configuration for image-tweak.
//!
//! # Route Structure
//!
//! ```text
//! /health                              - Health check (public)
//! /api/webhooks/auth                   - Auth-provider webhook (signature, when configured)
//! /api/upload                          - Multipart upload (protected)
//! /api/gallery                         - Gallery view (protected)
//! /api/uploads                         - Upload records (protected)
//! /api/uploads/{upload_id}/process     - Re-trigger processing (protected)
//! /api/images/{*key}                   - Preview / delete (protected)
//! /api/download/{*key}                 - Download (protected)
//! /, /upload, /gallery                 - HTML pages (user resolved when possible)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_tweak::server::routes::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new("my-secret-key")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{require_auth, resolve_auth, AuthMode, SessionAuth, DEV_USER_HEADER};
use super::handlers::{
    delete_handler, download_handler, gallery_handler, gallery_page_handler, health_handler,
    image_handler, landing_page_handler, reprocess_handler, upload_handler,
    upload_page_handler, uploads_handler, AppState,
};
use super::webhook::{webhook_handler, WebhookError, WebhookVerifier};
use crate::gallery::ImageService;

/// Default request body limit for uploads (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Shared secret for session tokens
    pub auth_secret: String,

    /// Whether session tokens are required
    pub auth_enabled: bool,

    /// Verifier for auth-provider webhooks; the route exists only when set
    pub webhook: Option<WebhookVerifier>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for image responses, in seconds
    pub cache_max_age: u32,

    /// Maximum upload request body, in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration requiring session tokens signed with `auth_secret`.
    pub fn new(auth_secret: impl Into<String>) -> Self {
        Self {
            auth_secret: auth_secret.into(),
            auth_enabled: true,
            webhook: None,
            cors_origins: None,
            cache_max_age: 300,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Create a configuration with authentication disabled.
    ///
    /// **Warning**: This should only be used for development/testing.
    pub fn without_auth() -> Self {
        Self {
            auth_enabled: false,
            ..Self::new(String::new())
        }
    }

    /// Verify webhooks with a `whsec_...` secret.
    pub fn with_webhook_secret(mut self, secret: &str) -> Result<Self, WebhookError> {
        self.webhook = Some(WebhookVerifier::new(secret)?);
        Ok(self)
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    fn auth_mode(&self) -> AuthMode {
        if self.auth_enabled {
            AuthMode::Tokens(SessionAuth::new(&self.auth_secret))
        } else {
            AuthMode::Development
        }
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
pub fn create_router(service: ImageService, config: RouterConfig) -> Router {
    let app_state = AppState::new(service).with_cache_max_age(config.cache_max_age);
    let mode = config.auth_mode();

    let api_routes = Router::new()
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/api/gallery", get(gallery_handler))
        .route("/api/uploads", get(uploads_handler))
        .route("/api/uploads/{upload_id}/process", post(reprocess_handler))
        .route("/api/images/{*key}", get(image_handler).delete(delete_handler))
        .route("/api/download/{*key}", get(download_handler))
        .route_layer(middleware::from_fn_with_state(mode.clone(), require_auth))
        .with_state(app_state.clone());

    let page_routes = Router::new()
        .route("/", get(landing_page_handler))
        .route("/upload", get(upload_page_handler))
        .route("/gallery", get(gallery_page_handler))
        .route_layer(middleware::from_fn_with_state(mode, resolve_auth))
        .with_state(app_state);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api_routes)
        .merge(page_routes);

    if let Some(verifier) = config.webhook.clone() {
        router = router.merge(
            Router::new()
                .route("/api/webhooks/auth", post(webhook_handler))
                .with_state(Arc::new(verifier)),
        );
    }

    let router = router.layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(DEV_USER_HEADER),
        ])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

/// Create a development router with authentication disabled.
///
/// **Warning**: This should only be used for local development and testing.
pub fn create_dev_router(service: ImageService) -> Router {
    create_router(service, RouterConfig::without_auth())
}

// =============================================================================
// Tests
// =============================================================================
