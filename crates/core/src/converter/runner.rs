//! Process runner on top of `tokio::process`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ConverterError;
use super::traits::{ProcessOutput, ProcessRunner};

/// Runs real child processes.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Appends `chunk` to `pending` and returns every completed line.
///
/// ffmpeg rewrites its status line with `\r`, so both `\r` and `\n` end a line.
/// Empty lines are dropped.
pub(crate) fn split_lines(pending: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    for &byte in chunk {
        if byte == b'\n' || byte == b'\r' {
            if !pending.is_empty() {
                lines.push(String::from_utf8_lossy(pending).into_owned());
                pending.clear();
            }
        } else {
            pending.push(byte);
        }
    }
    lines
}

fn looks_like_error(line: &str) -> bool {
    line.contains("Error") || line.contains("error")
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProcessOutput, ConverterError> {
        debug!(program = %program.display(), ?args, "Spawning process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::FfmpegNotFound {
                        path: program.to_path_buf(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::conversion_failed("stderr was not captured", None))?;

        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut error_output = String::new();

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(ConverterError::Cancelled);
                }
                read = stderr.read(&mut chunk) => read?,
            };
            if read == 0 {
                break;
            }

            for line in split_lines(&mut pending, &chunk[..read]) {
                if looks_like_error(&line) {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }
                if let Some(tx) = &lines {
                    // Receiver gone means nobody cares about progress any more
                    let _ = tx.send(line).await;
                }
            }
        }

        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending).into_owned();
            if looks_like_error(&line) {
                error_output.push_str(&line);
                error_output.push('\n');
            }
            if let Some(tx) = &lines {
                let _ = tx.send(line).await;
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(ConverterError::Cancelled);
            }
            status = child.wait() => status?,
        };

        Ok(ProcessOutput {
            exit_code: status.code(),
            error_output,
        })
    }
}
