//! Gallery service: uploads, listing, retrieval and deletion.
//!
//! The service owns the object store, the metadata store and the optional
//! processing endpoint, and enforces ownership on every key it touches.
//!
//! # Upload flow
//!
//! ```text
//! validate request ─► detect/resize images ─► write objects (concurrently)
//!                                                   │
//!          processing status ◄─ trigger processing ◄┴─ write record
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::imaging::{detect_image, resize_to_fill, ResizeTarget};
use crate::error::{GalleryError, StoreError};
use crate::model::timestamp::{newest_first, now_start_time};
use crate::model::{
    new_upload_id, object_key_for, original_name, GalleryEntry, GalleryView, UploadMetadata,
    UploadRecord,
};
use crate::processing::{ImageProcessor, ProcessingRequest, ProcessingStatus};
use crate::storage::{MetadataStore, ObjectStore};

/// Default maximum number of files in one upload.
pub const DEFAULT_MAX_FILES: usize = 8;

// =============================================================================
// Requests and outcomes
// =============================================================================

/// A file received in an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Name the client gave the file
    pub file_name: String,

    /// Declared content type, informational only
    pub content_type: Option<String>,

    pub data: Bytes,
}

/// An upload submission: optional metadata plus the files.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub metadata: UploadMetadata,
    pub files: Vec<IncomingFile>,
}

/// One stored file, as reported back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    pub file_name: String,
    pub s3_key: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub upload_id: String,
    pub uploaded_files: Vec<UploadedFile>,
    #[serde(rename = "metadata")]
    pub record: UploadRecord,
    pub processing: ProcessingStatus,
}

/// What happened to the owning record after a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The deleted key was the last one; the record is gone
    RecordDeleted,

    /// The record keeps `remaining` keys
    RecordUpdated { remaining: usize },
}

/// An image fetched for preview or download.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub key: String,
    pub display_name: String,
    pub content_type: String,
    pub data: Bytes,
}

// =============================================================================
// Image Service
// =============================================================================

/// Entry point for every gallery operation.
///
/// Cheap to share: all collaborators are behind `Arc`.
#[derive(Clone)]
pub struct ImageService {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    processor: Option<Arc<dyn ImageProcessor>>,
    max_files: usize,
    resize: Option<ResizeTarget>,
}

impl ImageService {
    /// Create a service without a processing endpoint.
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            objects,
            metadata,
            processor: None,
            max_files: DEFAULT_MAX_FILES,
            resize: None,
        }
    }

    /// Trigger `processor` after every upload.
    pub fn with_processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Resize every uploaded image to fill `target`.
    pub fn with_resize(mut self, target: Option<ResizeTarget>) -> Self {
        self.resize = target;
        self
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn has_processor(&self) -> bool {
        self.processor.is_some()
    }

    // -------------------------------------------------------------------------
    // Upload
    // -------------------------------------------------------------------------

    /// Store the files of an upload, record it, and hand it to processing.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before anything is written. A store
    /// failure while writing objects or the record is returned as
    /// [`GalleryError::Store`]. Processing failures are reported in the
    /// outcome, never as an error.
    pub async fn upload(
        &self,
        user: &str,
        request: UploadRequest,
    ) -> Result<UploadOutcome, GalleryError> {
        let UploadRequest { metadata, files } = request;

        if files.is_empty() {
            return Err(GalleryError::NoFiles);
        }
        if files.len() > self.max_files {
            return Err(GalleryError::TooManyFiles {
                count: files.len(),
                max: self.max_files,
            });
        }

        let client_keys = metadata.image_name.is_some();
        let keys = match metadata.image_name {
            Some(names) => {
                if names.len() != files.len() {
                    return Err(GalleryError::FileCountMismatch {
                        files: files.len(),
                        names: names.len(),
                    });
                }
                let keys: Vec<String> = names.iter().map(|n| n.trim().to_string()).collect();
                if keys.iter().any(|k| k.is_empty()) {
                    return Err(GalleryError::InvalidMetadata(
                        "imageName entries must not be empty".to_string(),
                    ));
                }
                {
                    let mut seen = HashSet::with_capacity(keys.len());
                    if let Some(dup) = keys.iter().find(|k| !seen.insert(k.as_str())) {
                        return Err(GalleryError::InvalidMetadata(format!(
                            "imageName contains {} more than once",
                            dup
                        )));
                    }
                }
                keys
            }
            None => files.iter().map(|f| object_key_for(&f.file_name)).collect(),
        };

        if let Some(claimed) = metadata.user.as_deref() {
            if claimed != user {
                return Err(GalleryError::UserMismatch);
            }
        }

        let image_parameters = metadata.image_parameters.unwrap_or_default();
        image_parameters
            .validate()
            .map_err(GalleryError::InvalidParameters)?;

        if let Some(id) = metadata.upload_id.as_deref().filter(|id| !id.trim().is_empty()) {
            if let Some(existing) = self.metadata.get_record(id).await? {
                if existing.user != user {
                    warn!(upload_id = %id, user = %user, "Upload id of another user refused");
                    return Err(GalleryError::Forbidden(format!("upload {}", id)));
                }
            }
        }
        if client_keys {
            self.ensure_keys_unclaimed(user, &keys).await?;
        }

        // Identify (and optionally resize) every file before writing any
        let mut prepared = Vec::with_capacity(files.len());
        for (file, key) in files.into_iter().zip(keys) {
            let detected =
                detect_image(&file.data).map_err(|reason| GalleryError::UnsupportedImage {
                    file_name: file.file_name.clone(),
                    reason,
                })?;

            let data = match self.resize {
                Some(target) => resize_to_fill(&file.data, detected, target).map_err(|reason| {
                    GalleryError::UnsupportedImage {
                        file_name: file.file_name.clone(),
                        reason,
                    }
                })?,
                None => file.data,
            };

            prepared.push((file.file_name, key, detected.content_type(), data));
        }

        let writes = prepared.iter().map(|(_, key, content_type, data)| {
            self.objects.put_object(key, data.clone(), content_type)
        });
        try_join_all(writes).await?;

        let record = UploadRecord {
            upload_id: metadata
                .upload_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_upload_id),
            user: user.to_string(),
            image_name: prepared.iter().map(|(_, key, _, _)| key.clone()).collect(),
            start_time: metadata
                .start_time
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(now_start_time),
            image_parameters,
        };

        self.metadata.put_record(&record).await?;

        info!(
            upload_id = %record.upload_id,
            user = %user,
            files = record.image_name.len(),
            "Upload stored"
        );

        let processing = self
            .trigger_processing(&record, prepared.iter().map(|(_, _, _, data)| data))
            .await;

        let uploaded_files = prepared
            .into_iter()
            .map(|(original, key, _, _)| UploadedFile {
                original_name: original,
                file_name: key.clone(),
                s3_key: key,
            })
            .collect();

        Ok(UploadOutcome {
            upload_id: record.upload_id.clone(),
            uploaded_files,
            record,
            processing,
        })
    }

    // -------------------------------------------------------------------------
    // Listing
    // -------------------------------------------------------------------------

    /// The user's upload records, newest first.
    pub async fn list_uploads(&self, user: &str) -> Result<Vec<UploadRecord>, GalleryError> {
        let mut records = self.metadata.records_for_user(user).await?;
        records.sort_by(|a, b| newest_first(&a.start_time, &b.start_time));
        Ok(records)
    }

    /// Every image of the user with its bytes, newest upload first.
    ///
    /// Objects that cannot be fetched are kept as unavailable entries.
    pub async fn gallery(&self, user: &str) -> Result<GalleryView, GalleryError> {
        let records = self.list_uploads(user).await?;

        let slots: Vec<(&UploadRecord, usize, &String)> = records
            .iter()
            .flat_map(|r| r.image_name.iter().enumerate().map(move |(i, k)| (r, i, k)))
            .collect();

        let fetched = join_all(slots.iter().map(|(_, _, key)| self.objects.get_object(key))).await;

        let images = slots
            .into_iter()
            .zip(fetched)
            .map(|((record, index, key), result)| {
                let (content_type, content, available) = match result {
                    Ok(object) => (object.content_type, STANDARD.encode(&object.data), true),
                    Err(e) => {
                        warn!(key = %key, upload_id = %record.upload_id, "Gallery object unavailable: {}", e);
                        (String::new(), String::new(), false)
                    }
                };
                GalleryEntry {
                    key: key.clone(),
                    display_name: record.display_name(index),
                    upload_id: record.upload_id.clone(),
                    start_time: record.start_time.clone(),
                    content_type,
                    content,
                    available,
                }
            })
            .collect();

        Ok(GalleryView { images })
    }

    // -------------------------------------------------------------------------
    // Retrieval and deletion
    // -------------------------------------------------------------------------

    /// Fetch an image the user owns.
    pub async fn fetch_image(&self, user: &str, key: &str) -> Result<DownloadedImage, GalleryError> {
        let record = self.owned_record_for_key(user, key).await?;
        let index = record.position(key).unwrap_or_default();

        let object = self.objects.get_object(key).await.map_err(|e| match e {
            StoreError::NotFound(_) => GalleryError::NotFound(key.to_string()),
            other => GalleryError::Store(other),
        })?;

        Ok(DownloadedImage {
            key: key.to_string(),
            display_name: record.display_name(index),
            content_type: object.content_type,
            data: object.data,
        })
    }

    /// Delete one image the user owns, updating or removing its record.
    pub async fn delete_image(&self, user: &str, key: &str) -> Result<DeleteOutcome, GalleryError> {
        let mut record = self.owned_record_for_key(user, key).await?;

        self.objects.delete_object(key).await?;

        if record.image_name.len() <= 1 {
            self.metadata.delete_record(&record.upload_id).await?;
            info!(key = %key, upload_id = %record.upload_id, "Image deleted, record removed");
            return Ok(DeleteOutcome::RecordDeleted);
        }

        record.remove_key(key);
        self.metadata
            .update_images(
                &record.upload_id,
                &record.image_name,
                &record.image_parameters,
            )
            .await?;

        let remaining = record.image_name.len();
        info!(key = %key, upload_id = %record.upload_id, remaining, "Image deleted");
        Ok(DeleteOutcome::RecordUpdated { remaining })
    }

    // -------------------------------------------------------------------------
    // Processing
    // -------------------------------------------------------------------------

    /// Hand an existing upload to processing again.
    pub async fn reprocess(
        &self,
        user: &str,
        upload_id: &str,
    ) -> Result<ProcessingStatus, GalleryError> {
        let record = self
            .metadata
            .get_record(upload_id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("upload {}", upload_id)))?;

        if record.user != user {
            return Err(GalleryError::Forbidden(format!("upload {}", upload_id)));
        }

        let Some(processor) = &self.processor else {
            return Ok(ProcessingStatus::Skipped);
        };

        let sources = if processor.wants_inline_images() {
            let fetches = record.image_name.iter().map(|k| self.objects.get_object(k));
            try_join_all(fetches)
                .await?
                .into_iter()
                .map(|o| o.data)
                .collect()
        } else {
            Vec::new()
        };

        Ok(self.trigger_processing(&record, sources.iter()).await)
    }

    async fn trigger_processing<'a, I>(&self, record: &UploadRecord, sources: I) -> ProcessingStatus
    where
        I: IntoIterator<Item = &'a Bytes>,
    {
        let Some(processor) = &self.processor else {
            debug!(upload_id = %record.upload_id, "No processing endpoint configured");
            return ProcessingStatus::Skipped;
        };

        let mut request = ProcessingRequest::from_record(record);
        if processor.wants_inline_images() {
            request = request.with_images(sources);
        }

        let status = ProcessingStatus::from(processor.process(&request).await);
        if let ProcessingStatus::Failed { error } = &status {
            warn!(upload_id = %record.upload_id, "Processing failed: {}", error);
        }
        status
    }

    /// Refuse client-chosen keys that an existing record already holds.
    ///
    /// Another user's key is [`GalleryError::Forbidden`]; one of the caller's
    /// own keys is [`GalleryError::InvalidMetadata`].
    async fn ensure_keys_unclaimed(
        &self,
        user: &str,
        keys: &[String],
    ) -> Result<(), GalleryError> {
        for key in keys {
            let Some(holder) = self
                .metadata
                .find_by_object_key(key)
                .await?
                .filter(|r| r.contains(key))
            else {
                continue;
            };

            if holder.user != user {
                warn!(key = %key, user = %user, "Upload to another user's key refused");
                return Err(GalleryError::Forbidden(original_name(key).to_string()));
            }
            return Err(GalleryError::InvalidMetadata(format!(
                "key {} is already used by upload {}",
                key, holder.upload_id
            )));
        }
        Ok(())
    }

    /// The record holding `key`, provided `user` owns it.
    async fn owned_record_for_key(
        &self,
        user: &str,
        key: &str,
    ) -> Result<UploadRecord, GalleryError> {
        let record = self
            .metadata
            .find_by_object_key(key)
            .await?
            .filter(|r| r.contains(key))
            .ok_or_else(|| GalleryError::NotFound(key.to_string()))?;

        if record.user != user {
            warn!(key = %key, user = %user, "Access to another user's image refused");
            return Err(GalleryError::Forbidden(original_name(key).to_string()));
        }

        Ok(record)
    }
}
