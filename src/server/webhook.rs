//! Auth-provider webhooks, verified with Svix-style signatures.
//!
//! Each delivery carries three headers:
//!
//! ```text
//! svix-id:        msg_2abc...
//! svix-timestamp: 1735689600
//! svix-signature: v1,<base64 signature> [v1,<base64 signature> ...]
//! ```
//!
//! The signature is `base64(HMAC-SHA256(key, "{id}.{timestamp}.{body}"))`, where
//! the key is the base64 part of a `whsec_...` secret. Deliveries whose
//! timestamp is more than [`TIMESTAMP_TOLERANCE_SECS`] away from now are
//! rejected to limit replays.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::handlers::ErrorResponse;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the provider and this server.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

const SECRET_PREFIX: &str = "whsec_";

/// Webhook verification failures.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid webhook timestamp")]
    InvalidTimestamp,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No matching webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        let error_type = match self {
            WebhookError::InvalidPayload(_) => "invalid_payload",
            _ => "invalid_signature",
        };

        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Webhook rejected: {}",
            self
        );

        let body = ErrorResponse::with_status(error_type, self.to_string(), status);
        (status, Json(body)).into_response()
    }
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl WebhookEvent {
    /// Id of the subject of the event (the user, for `user.*` events).
    pub fn subject_id(&self) -> Option<&str> {
        self.data.get("id").and_then(|v| v.as_str())
    }
}

/// Verifies webhook deliveries against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    /// Create a verifier from a `whsec_<base64>` secret.
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self { key })
    }

    /// Signature header value for a delivery (`v1,<base64>`).
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> String {
        format!("v1,{}", STANDARD.encode(self.mac(msg_id, timestamp, body)))
    }

    /// Verify a delivery against the current time.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, WebhookError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.verify_at(headers, body, now)
    }

    /// Verify a delivery as of `now` (Unix seconds).
    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        let msg_id = header_str(headers, "svix-id")?;
        let timestamp: i64 = header_str(headers, "svix-timestamp")?
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        let signatures = header_str(headers, "svix-signature")?;

        if now.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        let expected = self.mac(msg_id, timestamp, body);
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|sig| bool::from(sig.ct_eq(&expected)));

        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    fn mac(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(format!("{}.{}.", msg_id, timestamp).as_bytes());
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

/// Handle `POST /api/webhooks/auth`.
pub async fn webhook_handler(
    State(verifier): State<Arc<WebhookVerifier>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    let event = verifier.verify(&headers, &body)?;

    match event.event_type.as_str() {
        "user.created" => info!(
            user_id = event.subject_id().unwrap_or("unknown"),
            "New user created"
        ),
        other => debug!(event_type = other, "Webhook event acknowledged"),
    }

    Ok(Json(WebhookAck { success: true }))
}
