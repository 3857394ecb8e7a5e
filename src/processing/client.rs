use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ImageProcessor, ProcessingRequest, ProcessingResult};
use crate::error::ProcessingError;

/// Default request timeout for the processing endpoint, in seconds.
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 30;

/// Error body returned by the processing endpoint.
#[derive(Debug, Deserialize)]
struct EndpointError {
    error: Option<String>,
}

/// Processing endpoint reached over HTTP.
#[derive(Clone)]
pub struct HttpProcessor {
    client: reqwest::Client,
    endpoint: String,
    inline_images: bool,
}

impl HttpProcessor {
    /// Create a processor posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProcessingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessingError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            inline_images: true,
        })
    }

    /// Send only keys and parameters, without the source images.
    pub fn with_inline_images(mut self, inline: bool) -> Self {
        self.inline_images = inline;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageProcessor for HttpProcessor {
    async fn process(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessingError> {
        debug!(
            upload_id = %request.upload_id,
            images = request.image_name.len(),
            inline = request.image.len(),
            "Sending processing request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ProcessingError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProcessingError::Request(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<EndpointError>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());

            warn!(
                upload_id = %request.upload_id,
                status = status.as_u16(),
                "Processing endpoint rejected request: {}",
                message
            );

            return Err(ProcessingError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let result: ProcessingResult = serde_json::from_slice(&body)
            .map_err(|e| ProcessingError::InvalidResponse(e.to_string()))?;

        info!(
            upload_id = %request.upload_id,
            outputs = result.outputs.len(),
            "Processing started"
        );

        Ok(result)
    }

    fn wants_inline_images(&self) -> bool {
        self.inline_images
    }
}
