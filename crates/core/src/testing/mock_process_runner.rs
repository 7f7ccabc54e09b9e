//! Mock process runner for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::lock;
use crate::converter::{ConverterError, ProcessOutput, ProcessRunner};

/// A recorded process invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Mock implementation of the ProcessRunner trait.
///
/// Behaves like ffmpeg from the pipeline's point of view:
/// - Emits the scripted stderr lines
/// - Writes the output file (the argument before the trailing `-y`)
/// - Honors cancellation between lines and while "running"
///
/// # Example
///
/// ```rust,ignore
/// use tubetone_core::testing::MockProcessRunner;
///
/// let runner = Arc::new(MockProcessRunner::new());
/// runner.set_stderr_lines(vec![
///     "size=1kB time=00:00:10.00 bitrate=1.0kbits/s speed=1.0x".to_string(),
/// ]);
/// runner.fail_with_exit_code(1);
///
/// let transcoder = FfmpegTranscoder::new(config, runner.clone());
/// // ...
/// assert_eq!(runner.invocations().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockProcessRunner {
    invocations: Mutex<Vec<RecordedInvocation>>,
    stderr_lines: Mutex<Vec<String>>,
    exit_code: Mutex<Option<i32>>,
    create_output: AtomicBool,
    output_bytes: Mutex<Vec<u8>>,
    /// Simulated run time, spent after the stderr lines.
    delay: Mutex<Duration>,
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            stderr_lines: Mutex::new(Vec::new()),
            exit_code: Mutex::new(None),
            create_output: AtomicBool::new(true),
            output_bytes: Mutex::new(b"mock audio".to_vec()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Lines written to stderr on every run.
    pub fn set_stderr_lines(&self, lines: Vec<String>) {
        *lock(&self.stderr_lines) = lines;
    }

    /// Every following run exits with `code`.
    pub fn fail_with_exit_code(&self, code: i32) {
        *lock(&self.exit_code) = Some(code);
    }

    pub fn set_create_output(&self, create: bool) {
        self.create_output.store(create, Ordering::SeqCst);
    }

    pub fn set_output_bytes(&self, bytes: Vec<u8>) {
        *lock(&self.output_bytes) = bytes;
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        lock(&self.invocations).clone()
    }

    fn output_path(args: &[String]) -> Option<PathBuf> {
        match args {
            [.., output, last] if last == "-y" => Some(PathBuf::from(output)),
            _ => None,
        }
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutput, ConverterError> {
        lock(&self.invocations).push(RecordedInvocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        let stderr_lines = lock(&self.stderr_lines).clone();
        for line in stderr_lines {
            if cancel.is_cancelled() {
                return Err(ConverterError::Cancelled);
            }
            if let Some(tx) = &lines {
                let _ = tx.send(line).await;
            }
        }

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ConverterError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let exit_code = *lock(&self.exit_code);
        if let Some(code) = exit_code {
            return Ok(ProcessOutput::failed(code, "mock process failure"));
        }

        if self.create_output.load(Ordering::SeqCst) {
            if let Some(output) = Self::output_path(args) {
                if let Some(parent) = output.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let bytes = lock(&self.output_bytes).clone();
                tokio::fs::write(&output, bytes).await?;
            }
        }

        Ok(ProcessOutput::success())
    }
}
