//! Hand-off to the external image-processing function.
//!
//! The pixel work happens in an independently deployed endpoint. This module
//! builds the request it expects, sends it, and turns the outcome into a
//! status the HTTP layer can report. A failed hand-off never undoes an upload.

mod client;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::model::{ImageParameters, UploadRecord};

pub use client::{HttpProcessor, DEFAULT_PROCESSING_TIMEOUT_SECS};

/// Body POSTed to the processing endpoint.
///
/// Carries the whole upload record plus the top-level adjustment fields and
/// base64 sources the function reads directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub upload_id: String,
    pub user: String,
    pub image_name: Vec<String>,
    pub start_time: String,
    pub image_parameters: ImageParameters,
    pub brightness: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub rotation_state: i32,
    /// Base64-encoded source images, in `image_name` order
    pub image: Vec<String>,
}

impl ProcessingRequest {
    /// Build a request for a record without inline sources.
    pub fn from_record(record: &UploadRecord) -> Self {
        let params = &record.image_parameters;
        Self {
            upload_id: record.upload_id.clone(),
            user: record.user.clone(),
            image_name: record.image_name.clone(),
            start_time: record.start_time.clone(),
            image_parameters: params.clone(),
            brightness: params.brightness,
            contrast: params.contrast,
            saturation: params.saturation,
            rotation_state: params.rotation_state,
            image: Vec::new(),
        }
    }

    /// Attach source images, encoding them as base64.
    pub fn with_images<I, B>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.image = images.into_iter().map(|b| STANDARD.encode(b)).collect();
        self
    }
}

/// Successful answer from the processing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessingResult {
    /// Locations of the processed outputs
    #[serde(default, rename = "uploaded")]
    pub outputs: Vec<String>,
}

/// Outcome of a processing hand-off as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// The endpoint accepted the request
    Started { outputs: Vec<String> },

    /// The endpoint failed; the upload itself is kept
    Failed { error: String },

    /// No endpoint is configured
    Skipped,
}

impl From<Result<ProcessingResult, ProcessingError>> for ProcessingStatus {
    fn from(result: Result<ProcessingResult, ProcessingError>) -> Self {
        match result {
            Ok(result) => Self::Started {
                outputs: result.outputs,
            },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Something that can run the processing function for an upload.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(&self, request: &ProcessingRequest)
        -> Result<ProcessingResult, ProcessingError>;

    /// Whether requests should carry the source images inline.
    fn wants_inline_images(&self) -> bool {
        true
    }
}
