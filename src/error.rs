use thiserror::Error;

/// Errors raised by the object store and the metadata store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Object or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error from S3 or S3-compatible storage
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Error from DynamoDB or the configured document store
    #[error("Metadata store error: {0}")]
    MetadataStore(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A stored record could not be decoded
    #[error("Invalid record {upload_id}: {reason}")]
    InvalidRecord { upload_id: String, reason: String },
}

/// Errors returned by the external processing endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// Transport failure or timeout
    #[error("Processing request failed: {0}")]
    Request(String),

    /// Endpoint answered with a non-success status
    #[error("Processing endpoint rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Endpoint answered 2xx with a body we could not read
    #[error("Invalid processing response: {0}")]
    InvalidResponse(String),
}

/// Errors from gallery operations (upload, listing, download, delete).
///
/// Each variant maps to one HTTP status in the server layer.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// Multipart body could not be read
    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    /// Request body exceeds the upload limit
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// The metadata part is not valid JSON for an upload record
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// No files were attached
    #[error("At least one file must be uploaded")]
    NoFiles,

    /// Too many files in a single upload
    #[error("Too many files: {count} (max: {max})")]
    TooManyFiles { count: usize, max: usize },

    /// `imageName` was given but does not line up with the attached files
    #[error("Number of files ({files}) doesn't match number of image names ({names})")]
    FileCountMismatch { files: usize, names: usize },

    /// Metadata names a different user than the authenticated one
    #[error("Metadata user does not match the authenticated user")]
    UserMismatch,

    /// Parameter bundle is out of range
    #[error("Invalid image parameters: {0}")]
    InvalidParameters(String),

    /// File is not a recognised image
    #[error("Unsupported image {file_name}: {reason}")]
    UnsupportedImage { file_name: String, reason: String },

    /// Key or upload not referenced by any record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key or upload belongs to another user
    #[error("Access denied to {0}")]
    Forbidden(String),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
