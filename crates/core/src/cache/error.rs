use thiserror::Error;

/// Errors from the blob store and the cache built on it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid blob key: {key}")]
    InvalidKey { key: String },

    #[error("Failed to upload {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    #[error("Failed to serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn upload_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
