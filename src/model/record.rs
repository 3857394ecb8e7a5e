//! Upload records and the gallery view derived from them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::params::ImageParameters;

/// Length of a hyphenated UUID, the prefix of every generated object key.
const UUID_LEN: usize = 36;

/// Metadata for one upload submission, as stored in the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// Partition key of the metadata table
    pub upload_id: String,

    /// Owning user identifier
    pub user: String,

    /// Object-store keys, in upload order
    pub image_name: Vec<String>,

    /// Local timestamp, see [`crate::model::timestamp`]
    pub start_time: String,

    #[serde(default)]
    pub image_parameters: ImageParameters,
}

impl UploadRecord {
    /// Position of `key` within this record.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.image_name.iter().position(|k| k == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Name shown to the user for the image at `index`.
    ///
    /// A user override wins; otherwise the original file name recovered from
    /// the key.
    pub fn display_name(&self, index: usize) -> String {
        if let Some(name) = self.image_parameters.overwritten_filename.for_index(index) {
            return name.to_string();
        }
        self.image_name
            .get(index)
            .map(|key| original_name(key).to_string())
            .unwrap_or_default()
    }

    /// Remove `key` and its per-image override entry. Returns whether the
    /// key was present.
    pub fn remove_key(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => {
                self.image_name.remove(index);
                self.image_parameters
                    .overwritten_filename
                    .remove_index(index);
                true
            }
            None => false,
        }
    }
}

/// Upload metadata as sent by clients.
///
/// Every field is optional; the server fills in identifiers, keys and the
/// start time when they are missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    #[serde(default)]
    pub upload_id: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub image_name: Option<Vec<String>>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub image_parameters: Option<ImageParameters>,
}

/// Generate a fresh upload identifier.
pub fn new_upload_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an object key for a file: `{uuid}_{file name}`.
///
/// Path separators in the file name are replaced so keys stay flat.
pub fn object_key_for(file_name: &str) -> String {
    let file_name = file_name.trim();
    let file_name = if file_name.is_empty() {
        "image"
    } else {
        file_name
    };
    let sanitized: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_{}", Uuid::new_v4(), sanitized)
}

/// Recover the original file name from an object key.
///
/// Keys without a UUID prefix are returned unchanged.
pub fn original_name(key: &str) -> &str {
    let base = key.rsplit('/').next().unwrap_or(key);
    match base.get(..UUID_LEN) {
        Some(prefix)
            if base.as_bytes().get(UUID_LEN) == Some(&b'_') && Uuid::parse_str(prefix).is_ok() =>
        {
            &base[UUID_LEN + 1..]
        }
        _ => base,
    }
}

/// One image in a user's gallery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    /// Object-store key
    pub key: String,

    /// Original or overridden name
    pub display_name: String,

    pub upload_id: String,

    pub start_time: String,

    pub content_type: String,

    /// Base64 image bytes, empty when the object could not be fetched
    pub content: String,

    /// Whether `content` holds the object
    pub available: bool,
}

/// All images of a user, newest upload first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GalleryView {
    pub images: Vec<GalleryEntry>,
}

impl GalleryView {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}
