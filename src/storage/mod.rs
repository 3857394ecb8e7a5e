//! Storage backends for image bytes and upload metadata.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              ImageService               │
//! └───────────┬─────────────────┬───────────┘
//!             │                 │
//!             ▼                 ▼
//! ┌─────────────────┐  ┌─────────────────────┐
//! │  ObjectStore    │  │  MetadataStore      │
//! │  (image bytes)  │  │  (upload records)   │
//! └───────┬─────────┘  └─────────┬───────────┘
//!         │                      │
//!    S3ObjectStore        DynamoMetadataStore
//!    MemoryObjectStore    MemoryMetadataStore
//! ```
//!
//! Both traits are object safe so the service can hold them behind `Arc<dyn _>`.

mod dynamodb;
mod memory;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::model::{ImageParameters, UploadRecord};

pub use dynamodb::{
    create_dynamodb_client, item_to_record, record_to_item, DynamoMetadataStore,
    DEFAULT_TABLE_NAME, DEFAULT_USER_INDEX,
};
pub use memory::{MemoryMetadataStore, MemoryObjectStore};
pub use s3::{create_s3_client, S3ObjectStore};

/// Content type used when neither the client nor the bytes tell us better.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// An object read back from the object store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Key-addressed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<(), StoreError>;

    /// Read the object stored under `key`.
    ///
    /// Returns `StoreError::NotFound` when no such object exists.
    async fn get_object(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Delete the object under `key`. Deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;
}

/// Per-upload metadata records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace a record.
    async fn put_record(&self, record: &UploadRecord) -> Result<(), StoreError>;

    /// Look up a record by upload id.
    async fn get_record(&self, upload_id: &str) -> Result<Option<UploadRecord>, StoreError>;

    /// All records owned by `user`, in store order.
    async fn records_for_user(&self, user: &str) -> Result<Vec<UploadRecord>, StoreError>;

    /// The first record whose key list contains `key` exactly.
    async fn find_by_object_key(&self, key: &str) -> Result<Option<UploadRecord>, StoreError>;

    /// Replace the key list and the parameter bundle of a record.
    ///
    /// Returns `StoreError::NotFound` when no such record exists.
    async fn update_images(
        &self,
        upload_id: &str,
        image_name: &[String],
        image_parameters: &ImageParameters,
    ) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record succeeds.
    async fn delete_record(&self, upload_id: &str) -> Result<(), StoreError>;
}
