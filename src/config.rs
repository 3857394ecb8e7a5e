//! Configuration management for image-tweak.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap, organised as subcommands
//! - Environment variables with the `IMAGE_TWEAK_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Subcommands
//!
//! - `serve` - Run the HTTP server
//! - `token` - Issue a session token for a user
//! - `check` - Verify S3 and DynamoDB connectivity
//!
//! # Environment Variables
//!
//! - `IMAGE_TWEAK_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMAGE_TWEAK_PORT` - Server port (default: 3000)
//! - `IMAGE_TWEAK_S3_BUCKET` - S3 bucket for image bytes (required)
//! - `IMAGE_TWEAK_S3_PREFIX` - Key prefix inside the bucket
//! - `IMAGE_TWEAK_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `IMAGE_TWEAK_S3_REGION` - AWS region (default: us-east-1)
//! - `IMAGE_TWEAK_DYNAMODB_TABLE` - Metadata table (default: ImageMetaData)
//! - `IMAGE_TWEAK_DYNAMODB_USER_INDEX` - Index keyed by user (default: user-index)
//! - `IMAGE_TWEAK_DYNAMODB_ENDPOINT` - Custom DynamoDB endpoint (DynamoDB Local, etc.)
//! - `IMAGE_TWEAK_AUTH_ENABLED` - Require session tokens (default: true)
//! - `IMAGE_TWEAK_AUTH_SECRET` - HMAC secret for session tokens
//! - `IMAGE_TWEAK_WEBHOOK_SECRET` - `whsec_...` secret for auth-provider webhooks
//! - `IMAGE_TWEAK_PROCESSING_ENDPOINT` - URL of the image-processing function
//! - `IMAGE_TWEAK_PROCESSING_TIMEOUT` - Processing request timeout in seconds (default: 30)
//! - `IMAGE_TWEAK_PROCESSING_INLINE_IMAGES` - Send sources as base64 (default: true)
//! - `IMAGE_TWEAK_UPLOAD_RESIZE` - Resize uploads to fill `WxH`
//! - `IMAGE_TWEAK_MAX_FILES` - Files per upload (default: 8)
//! - `IMAGE_TWEAK_MAX_UPLOAD_BYTES` - Upload body limit (default: 25 MiB)
//! - `IMAGE_TWEAK_CACHE_MAX_AGE` - Cache-Control max-age for images (default: 300)
//! - `IMAGE_TWEAK_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `IMAGE_TWEAK_VERBOSE` - Debug-level logging (default: false)
//! - `IMAGE_TWEAK_NO_TRACING` - Disable request tracing (default: false)

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::gallery::{ResizeTarget, DEFAULT_MAX_FILES};
use crate::processing::DEFAULT_PROCESSING_TIMEOUT_SECS;
use crate::server::{WebhookVerifier, DEFAULT_MAX_UPLOAD_BYTES};
use crate::storage::{DEFAULT_TABLE_NAME, DEFAULT_USER_INDEX};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default HTTP cache max-age for images, in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 300;

/// Default session token lifetime, in seconds.
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

/// Smallest accepted upload body limit.
const MIN_UPLOAD_BYTES: usize = 1024;

// =============================================================================
// CLI
// =============================================================================

/// image-tweak - upload, adjust and browse images.
///
/// Stores images in S3, upload metadata in DynamoDB, and hands uploads to an
/// external processing function.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-tweak")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeConfig),

    /// Issue a session token for a user
    Token(TokenConfig),

    /// Check S3 and DynamoDB connectivity
    Check(CheckConfig),
}

// =============================================================================
// Serve
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMAGE_TWEAK_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMAGE_TWEAK_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket holding the uploaded images.
    #[arg(long, env = "IMAGE_TWEAK_S3_BUCKET")]
    pub s3_bucket: String,

    /// Key prefix inside the bucket.
    #[arg(long, env = "IMAGE_TWEAK_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "IMAGE_TWEAK_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3 and DynamoDB.
    #[arg(long, default_value = DEFAULT_REGION, env = "IMAGE_TWEAK_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // DynamoDB Configuration
    // =========================================================================
    /// Table holding one record per upload.
    #[arg(long, default_value = DEFAULT_TABLE_NAME, env = "IMAGE_TWEAK_DYNAMODB_TABLE")]
    pub dynamodb_table: String,

    /// Secondary index keyed by `user`.
    #[arg(long, default_value = DEFAULT_USER_INDEX, env = "IMAGE_TWEAK_DYNAMODB_USER_INDEX")]
    pub dynamodb_user_index: String,

    /// Custom DynamoDB endpoint URL (DynamoDB Local, etc.).
    #[arg(long, env = "IMAGE_TWEAK_DYNAMODB_ENDPOINT")]
    pub dynamodb_endpoint: Option<String>,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Require session tokens.
    ///
    /// When disabled, the user is taken from the `X-User-Id` header or the
    /// `user` query parameter. WARNING: development only.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "IMAGE_TWEAK_AUTH_ENABLED")]
    pub auth_enabled: bool,

    /// Shared secret for HMAC-SHA256 session tokens.
    #[arg(long, env = "IMAGE_TWEAK_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// `whsec_...` secret for auth-provider webhooks. The webhook route is
    /// only mounted when this is set.
    #[arg(long, env = "IMAGE_TWEAK_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    // =========================================================================
    // Processing Configuration
    // =========================================================================
    /// URL of the image-processing function. Processing is skipped when unset.
    #[arg(long, env = "IMAGE_TWEAK_PROCESSING_ENDPOINT")]
    pub processing_endpoint: Option<String>,

    /// Processing request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_PROCESSING_TIMEOUT_SECS, env = "IMAGE_TWEAK_PROCESSING_TIMEOUT")]
    pub processing_timeout: u64,

    /// Send the source images base64-encoded with each processing request.
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "IMAGE_TWEAK_PROCESSING_INLINE_IMAGES")]
    pub processing_inline_images: bool,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Resize every upload to fill WIDTHxHEIGHT (e.g. 1024x768).
    #[arg(long, env = "IMAGE_TWEAK_UPLOAD_RESIZE")]
    pub upload_resize: Option<ResizeTarget>,

    /// Maximum number of files per upload.
    #[arg(long, default_value_t = DEFAULT_MAX_FILES, env = "IMAGE_TWEAK_MAX_FILES")]
    pub max_files: usize,

    /// Maximum upload request body in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "IMAGE_TWEAK_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// HTTP Cache-Control max-age for image responses, in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "IMAGE_TWEAK_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Any origin when unset.
    #[arg(long, env = "IMAGE_TWEAK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, env = "IMAGE_TWEAK_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, env = "IMAGE_TWEAK_NO_TRACING", default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_enabled && self.auth_secret.as_deref().map_or(true, str::is_empty) {
            return Err(
                "Authentication is enabled but no secret provided. \
                 Set --auth-secret or IMAGE_TWEAK_AUTH_SECRET, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }

        if self.s3_bucket.trim().is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or IMAGE_TWEAK_S3_BUCKET".to_string(),
            );
        }

        if self.dynamodb_table.trim().is_empty() {
            return Err("DynamoDB table name must not be empty".to_string());
        }
        if self.dynamodb_user_index.trim().is_empty() {
            return Err("DynamoDB user index must not be empty".to_string());
        }

        if let Some(secret) = &self.webhook_secret {
            WebhookVerifier::new(secret)
                .map_err(|_| "webhook_secret must look like whsec_<base64>".to_string())?;
        }

        if let Some(endpoint) = &self.processing_endpoint {
            validate_http_url("processing_endpoint", endpoint)?;
        }
        if self.processing_timeout == 0 {
            return Err("processing_timeout must be greater than 0".to_string());
        }

        if self.max_files == 0 {
            return Err("max_files must be greater than 0".to_string());
        }
        if self.max_upload_bytes < MIN_UPLOAD_BYTES {
            return Err(format!(
                "max_upload_bytes must be at least {}",
                MIN_UPLOAD_BYTES
            ));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the auth secret, or an empty string (call validate() first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got {}", name, other)),
    }
}

// =============================================================================
// Token
// =============================================================================

/// Output format for `token`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenOutputFormat {
    /// The bare token
    #[default]
    Token,

    /// An `Authorization` header line
    Header,

    /// JSON with the token, user and expiry
    Json,
}

/// Options for `token`.
#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// User id to issue the token for.
    pub user_id: String,

    /// Shared secret for HMAC-SHA256 session tokens.
    #[arg(long, env = "IMAGE_TWEAK_AUTH_SECRET")]
    pub secret: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL)]
    pub ttl: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = TokenOutputFormat::Token)]
    pub format: TokenOutputFormat,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user id must not be empty".to_string());
        }
        if self.secret.is_empty() {
            return Err("secret must not be empty".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Check
// =============================================================================

/// Options for `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// S3 bucket holding the uploaded images.
    #[arg(long, env = "IMAGE_TWEAK_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL.
    #[arg(long, env = "IMAGE_TWEAK_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3 and DynamoDB.
    #[arg(long, default_value = DEFAULT_REGION, env = "IMAGE_TWEAK_S3_REGION")]
    pub s3_region: String,

    /// Table holding one record per upload.
    #[arg(long, default_value = DEFAULT_TABLE_NAME, env = "IMAGE_TWEAK_DYNAMODB_TABLE")]
    pub dynamodb_table: String,

    /// Secondary index keyed by `user`.
    #[arg(long, default_value = DEFAULT_USER_INDEX, env = "IMAGE_TWEAK_DYNAMODB_USER_INDEX")]
    pub dynamodb_user_index: String,

    /// Custom DynamoDB endpoint URL.
    #[arg(long, env = "IMAGE_TWEAK_DYNAMODB_ENDPOINT")]
    pub dynamodb_endpoint: Option<String>,

    /// List the uploads of this user after connecting.
    #[arg(long)]
    pub user: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    /// The bucket to check, or an error naming how to set it.
    pub fn resolve_bucket(&self) -> Result<String, String> {
        self.s3_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "no bucket configured (use --s3-bucket or IMAGE_TWEAK_S3_BUCKET)".to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
