//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::ConverterError;

/// Result of a finished external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Lines from stderr that looked like errors.
    pub error_output: String,
}

impl ProcessOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            error_output: String::new(),
        }
    }

    pub fn failed(exit_code: i32, error_output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            error_output: error_output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external programs and streams their stderr.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args` to completion.
    ///
    /// Each stderr line (split on `\n` or `\r`) is sent to `lines` if given.
    /// The process is killed and [`ConverterError::Cancelled`] returned once
    /// `cancel` fires.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutput, ConverterError>;
}
