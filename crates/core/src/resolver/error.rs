use thiserror::Error;

/// Errors from video lookup and media download.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Video not found: {id}")]
    NotFound { id: String },

    #[error("No applicable media streams found for this video")]
    NoStreams,

    #[error("yt-dlp not found at path: {path}")]
    ToolNotFound { path: String },

    #[error("Resolver command failed: {reason}")]
    CommandFailed { reason: String },

    #[error("Failed to parse resolver output: {reason}")]
    Parse { reason: String },

    #[error("Download failed: {reason}")]
    Download { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download cancelled")]
    Cancelled,
}

impl ResolverError {
    pub fn command_failed(reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            reason: reason.into(),
        }
    }

    pub fn download(reason: impl Into<String>) -> Self {
        Self::Download {
            reason: reason.into(),
        }
    }

    /// Whether the fault happened while moving bytes rather than resolving.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Io(_))
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(e: reqwest::Error) -> Self {
        Self::download(e.to_string())
    }
}
