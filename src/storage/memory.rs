//! In-process stores for development runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{MetadataStore, ObjectStore, StoredObject};
use crate::error::StoreError;
use crate::model::{ImageParameters, UploadRecord};

/// Object store kept in a hash map.
///
/// Clones share the same contents. Failure injection lets tests exercise the
/// error paths of the service layer.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>, content_type: &str) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make every subsequent `put_object` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete_object` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::ObjectStore(format!("write refused: {}", key)));
        }
        self.insert(key, data, content_type).await;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("memory://{}", key)))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::ObjectStore(format!("delete refused: {}", key)));
        }
        self.objects.write().await.remove(key);
        Ok(())
    }
}

/// Metadata store kept in insertion order.
#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    records: Arc<RwLock<Vec<UploadRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Make every subsequent `put_record` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put_record(&self, record: &UploadRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::MetadataStore(format!(
                "write refused: {}",
                record.upload_id
            )));
        }

        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.upload_id == record.upload_id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn get_record(&self, upload_id: &str) -> Result<Option<UploadRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.upload_id == upload_id)
            .cloned())
    }

    async fn records_for_user(&self, user: &str) -> Result<Vec<UploadRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.user == user)
            .cloned()
            .collect())
    }

    async fn find_by_object_key(&self, key: &str) -> Result<Option<UploadRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.contains(key))
            .cloned())
    }

    async fn update_images(
        &self,
        upload_id: &str,
        image_name: &[String],
        image_parameters: &ImageParameters,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.upload_id == upload_id)
            .ok_or_else(|| StoreError::NotFound(format!("upload {}", upload_id)))?;

        record.image_name = image_name.to_vec();
        record.image_parameters = image_parameters.clone();
        Ok(())
    }

    async fn delete_record(&self, upload_id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .retain(|r| r.upload_id != upload_id);
        Ok(())
    }
}
