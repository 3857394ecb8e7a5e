//! Records shared by the stores, the service layer and the HTTP API.

mod params;
mod record;
pub mod timestamp;

pub use params::{
    FilenameOverride, ImageParameters, OutputFormat, DEFAULT_LEVEL, DEFAULT_OPACITY,
    DEFAULT_RESOLUTION, MAX_LEVEL, MAX_ROTATION,
};
pub use record::{
    new_upload_id, object_key_for, original_name, GalleryEntry, GalleryView, UploadMetadata,
    UploadRecord,
};
pub use timestamp::{format_start_time, newest_first, now_start_time, parse_start_time};
