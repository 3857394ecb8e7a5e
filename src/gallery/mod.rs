//! Gallery operations on top of the stores and the processing endpoint.

mod imaging;
mod service;

pub use imaging::{detect_image, resize_to_fill, DetectedImage, ResizeTarget};
pub use service::{
    DeleteOutcome, DownloadedImage, ImageService, IncomingFile, UploadOutcome, UploadRequest,
    UploadedFile, DEFAULT_MAX_FILES,
};
