//! Session-token authentication.
//!
//! The auth provider issues session tokens bound to a user id and an expiry:
//!
//! ```text
//! token     = "{user_id}.{expiry}.{signature}"
//! signature = hex(HMAC-SHA256(secret_key, "{user_id}.{expiry}"))
//! ```
//!
//! Tokens are accepted from an `Authorization: Bearer` header or a `token`
//! query parameter (so that plain links such as downloads can carry them).
//! User ids may contain dots; the token is split from the right.
//!
//! With authentication disabled the server runs in development mode: the user
//! comes from an `X-User-Id` header or a `user` query parameter and defaults
//! to [`DEV_USER`].
//!
//! # Example
//!
//! ```rust
//! use image_tweak::server::auth::SessionAuth;
//! use std::time::Duration;
//!
//! let auth = SessionAuth::new("my-secret-key");
//! let token = auth.issue("user_2abc", Duration::from_secs(3600));
//! assert_eq!(auth.verify(&token).unwrap(), "user_2abc");
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

type HmacSha256 = Hmac<Sha256>;

/// User assumed in development mode when the request names none.
pub const DEV_USER: &str = "dev-user";

/// Header naming the user in development mode.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No token in the header or the query string
    MissingToken,

    /// Token is not `user.expiry.signature` with a numeric expiry and hex signature
    MalformedToken,

    /// Token has expired
    Expired {
        expired_at: u64,
        current_time: u64,
    },

    /// Signature does not match
    InvalidSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing session token"),
            AuthError::MalformedToken => write!(f, "Malformed session token"),
            AuthError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Session expired at {} (current time: {})",
                expired_at, current_time
            ),
            AuthError::InvalidSignature => write!(f, "Invalid session signature"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
            AuthError::MalformedToken => (StatusCode::BAD_REQUEST, "malformed_token"),
            AuthError::Expired { .. } => (StatusCode::UNAUTHORIZED, "session_expired"),
            AuthError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
        };
        let message = self.to_string();

        // Forged tokens are worth a warning; the rest is routine
        if matches!(self, AuthError::InvalidSignature) {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        } else {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Authentication failed: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// Session tokens
// =============================================================================

/// Issues and verifies HMAC-SHA256 session tokens.
#[derive(Clone)]
pub struct SessionAuth {
    secret_key: Vec<u8>,
}

impl SessionAuth {
    /// Create an authenticator with the shared secret.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Issue a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: &str, ttl: Duration) -> String {
        self.issue_with_expiry(user_id, unix_now().saturating_add(ttl.as_secs()))
    }

    /// Issue a token expiring at the given Unix timestamp.
    pub fn issue_with_expiry(&self, user_id: &str, expiry: u64) -> String {
        format!(
            "{}.{}.{}",
            user_id,
            expiry,
            hex::encode(self.mac(user_id, expiry))
        )
    }

    /// Verify a token and return the user id it carries.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut parts = token.trim().rsplitn(3, '.');
        let (Some(signature), Some(expiry), Some(user_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        if user_id.is_empty() {
            return Err(AuthError::MalformedToken);
        }
        let expiry: u64 = expiry.parse().map_err(|_| AuthError::MalformedToken)?;
        let provided = hex::decode(signature).map_err(|_| AuthError::MalformedToken)?;

        let current_time = unix_now();
        if current_time > expiry {
            return Err(AuthError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        let expected = self.mac(user_id, expiry);
        if provided.ct_eq(&expected).into() {
            Ok(user_id.to_string())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }

    fn mac(&self, user_id: &str, expiry: u64) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(user_id.as_bytes());
        mac.update(b".");
        mac.update(expiry.to_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

// =============================================================================
// Request identity
// =============================================================================

/// How requests are authenticated.
#[derive(Clone)]
pub enum AuthMode {
    /// Session tokens signed with a shared secret
    Tokens(SessionAuth),

    /// No verification; the user is named by the request
    Development,
}

impl AuthMode {
    /// Resolve the user making a request from its headers and query string.
    pub fn resolve(&self, headers: &HeaderMap, query: &str) -> Result<AuthenticatedUser, AuthError> {
        match self {
            AuthMode::Tokens(auth) => {
                let token = bearer_token(headers)
                    .or_else(|| query_param(query, "token"))
                    .ok_or(AuthError::MissingToken)?;
                let user_id = auth.verify(&token)?;
                Ok(AuthenticatedUser::new(user_id, "token", &token))
            }
            AuthMode::Development => {
                let user_id = headers
                    .get(DEV_USER_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim().to_string())
                    .or_else(|| query_param(query, "user"))
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| DEV_USER.to_string());
                let auth_query_user = user_id.clone();
                Ok(AuthenticatedUser::new(user_id, "user", &auth_query_user))
            }
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, AuthMode::Development)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

/// The user a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,

    /// Query string (`token=...` or `user=...`) that authenticates links
    /// rendered for this user
    pub auth_query: String,
}

impl AuthenticatedUser {
    fn new(user_id: String, param: &str, value: &str) -> Self {
        let auth_query = form_urlencoded::Serializer::new(String::new())
            .append_pair(param, value)
            .finish();
        Self {
            user_id,
            auth_query,
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Extractor for pages that render for anonymous visitors too.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Reject requests that cannot be authenticated.
///
/// On success the [`AuthenticatedUser`] is stored in the request extensions.
pub async fn require_auth(
    State(mode): State<AuthMode>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let query = request.uri().query().unwrap_or("").to_string();
    let user = mode.resolve(request.headers(), &query)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attach the user when the request authenticates, and continue either way.
pub async fn resolve_auth(State(mode): State<AuthMode>, mut request: Request, next: Next) -> Response {
    let query = request.uri().query().unwrap_or("").to_string();
    match mode.resolve(request.headers(), &query) {
        Ok(user) => {
            request.extensions_mut().insert(user);
        }
        Err(e) => debug!("Rendering page without a user: {}", e),
    }
    next.run(request).await
}

// =============================================================================
// Tests
// =============================================================================
