use thiserror::Error;

use crate::cache::StorageError;
use crate::converter::ConverterError;
use crate::job::CANCELLED_MESSAGE;
use crate::resolver::ResolverError;

/// Fault that ends a conversion job.
///
/// The display text is what gets recorded in the job's `error` field.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No eligible stream, or the video could not be looked up.
    #[error("{0}")]
    Resolution(ResolverError),

    /// Download or upload fault.
    #[error("{0}")]
    Transfer(String),

    /// Transcoder or tagging failure.
    #[error("{0}")]
    Process(ConverterError),

    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,
}

impl ConversionError {
    pub fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer(reason.into())
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Transfer(_) => "transfer",
            Self::Process(_) => "process",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ResolverError> for ConversionError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::Cancelled => Self::Cancelled,
            e if e.is_transfer() => Self::Transfer(e.to_string()),
            e => Self::Resolution(e),
        }
    }
}

impl From<ConverterError> for ConversionError {
    fn from(e: ConverterError) -> Self {
        match e {
            ConverterError::Cancelled => Self::Cancelled,
            e => Self::Process(e),
        }
    }
}

impl From<StorageError> for ConversionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Cancelled => Self::Cancelled,
            e => Self::Transfer(e.to_string()),
        }
    }
}
