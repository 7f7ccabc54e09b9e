//! FFmpeg-based transcoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::{ProcessOutput, ProcessRunner};
use super::types::{sanitize_file_name, TrackTags};

/// Converts downloaded media to audio and tags the result.
pub struct FfmpegTranscoder {
    config: ConverterConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl FfmpegTranscoder {
    pub fn new(config: ConverterConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Arguments for the audio extraction: `-i <in> -q:a 0 -map a <out> -y`.
    pub fn build_args(input_path: &Path, output_path: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-q:a".to_string(),
            "0".to_string(),
            "-map".to_string(),
            "a".to_string(),
            output_path.to_string_lossy().to_string(),
            "-y".to_string(),
        ]
    }

    /// Arguments for a stream-copy remux that only rewrites metadata.
    pub fn build_tag_args(input_path: &Path, output_path: &Path, tags: &TrackTags) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
        ];
        args.extend(tags.to_ffmpeg_args());
        args.push(output_path.to_string_lossy().to_string());
        args.push("-y".to_string());
        args
    }

    /// Directory holding every output file of one processing attempt.
    pub fn work_dir(&self, work_id: &str) -> PathBuf {
        self.config.output_dir.join(work_id)
    }

    /// Where the converted file for `title` is written.
    pub fn output_path(&self, work_id: &str, title: &str) -> PathBuf {
        self.work_dir(work_id)
            .join(sanitize_file_name(title, &self.config.audio_extension))
    }

    /// Scratch file used while tagging; keeps the extension so ffmpeg picks the
    /// same muxer.
    pub fn scratch_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = output_path
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        output_path.with_file_name(format!("{}.tagging.{}", stem, ext))
    }

    fn check_exit(output: &ProcessOutput) -> Result<(), ConverterError> {
        if output.is_success() {
            return Ok(());
        }
        Err(ConverterError::conversion_failed(
            format!("FFmpeg exited with code: {:?}", output.exit_code),
            if output.error_output.is_empty() {
                None
            } else {
                Some(output.error_output.clone())
            },
        ))
    }

    /// Transcodes `input_path` into `output_path`, streaming stderr to `lines`.
    ///
    /// Returns the size of the produced file.
    pub async fn transcode(
        &self,
        input_path: &Path,
        output_path: &Path,
        lines: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<u64, ConverterError> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = Self::build_args(input_path, output_path);
        let output = self
            .runner
            .run(&self.config.ffmpeg_path, &args, lines, cancel)
            .await?;
        Self::check_exit(&output)?;

        let meta = tokio::fs::metadata(output_path)
            .await
            .map_err(|_| ConverterError::OutputMissing {
                path: output_path.to_path_buf(),
            })?;

        info!(
            output = %output_path.display(),
            size_bytes = meta.len(),
            "Transcoding finished"
        );
        Ok(meta.len())
    }

    /// Writes artist/title tags into `path` via a scratch file renamed over it.
    pub async fn write_tags(
        &self,
        path: &Path,
        tags: &TrackTags,
        cancel: CancellationToken,
    ) -> Result<(), ConverterError> {
        let scratch = Self::scratch_path(path);
        let args = Self::build_tag_args(path, &scratch, tags);
        debug!(path = %path.display(), artist = %tags.artist, title = %tags.title, "Writing tags");

        let result = self
            .runner
            .run(&self.config.ffmpeg_path, &args, None, cancel)
            .await
            .and_then(|output| Self::check_exit(&output));

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(match e {
                ConverterError::Cancelled => ConverterError::Cancelled,
                other => ConverterError::tagging_failed(other.to_string()),
            });
        }

        if tokio::fs::metadata(&scratch).await.is_err() {
            return Err(ConverterError::tagging_failed(format!(
                "tagged file not created: {}",
                scratch.display()
            )));
        }
        tokio::fs::rename(&scratch, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessRunner;
    use tempfile::TempDir;

    fn transcoder(dir: &TempDir, runner: Arc<MockProcessRunner>) -> FfmpegTranscoder {
        FfmpegTranscoder::new(ConverterConfig::default().with_work_dir(dir.path()), runner)
    }

    #[test]
    fn test_build_args() {
        let args = FfmpegTranscoder::build_args(Path::new("/in/a.webm"), Path::new("/out/a.mp3"));
        assert_eq!(
            args,
            vec!["-i", "/in/a.webm", "-q:a", "0", "-map", "a", "/out/a.mp3", "-y"]
        );
    }

    #[test]
    fn test_build_tag_args() {
        let tags = TrackTags {
            artist: "Daft Punk".to_string(),
            title: "One More Time".to_string(),
        };
        let args =
            FfmpegTranscoder::build_tag_args(Path::new("/o/a.mp3"), Path::new("/o/a.tagging.mp3"), &tags);
        assert!(args.contains(&"artist=Daft Punk".to_string()));
        assert!(args.contains(&"title=One More Time".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-y"));
    }

    #[test]
    fn test_scratch_path_keeps_extension() {
        assert_eq!(
            FfmpegTranscoder::scratch_path(Path::new("/o/Song.mp3")),
            PathBuf::from("/o/Song.tagging.mp3")
        );
    }

    #[test]
    fn test_output_path_is_per_work_dir() {
        let dir = TempDir::new().unwrap();
        let t = transcoder(&dir, Arc::new(MockProcessRunner::new()));
        let path = t.output_path("inv-1", "A/B");
        assert_eq!(path, dir.path().join("output").join("inv-1").join("A_B.mp3"));
    }

    #[tokio::test]
    async fn test_transcode_reports_size() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockProcessRunner::new());
        let t = transcoder(&dir, runner.clone());
        let out = t.output_path("inv-1", "song");

        let size = t
            .transcode(Path::new("/in.webm"), &out, None, CancellationToken::new())
            .await
            .unwrap();
        assert!(size > 0);
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_transcode_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockProcessRunner::new());
        runner.fail_with_exit_code(1);
        let t = transcoder(&dir, runner);
        let out = t.output_path("inv-1", "song");

        let err = t
            .transcode(Path::new("/in.webm"), &out, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::ConversionFailed { .. }));
    }

    #[tokio::test]
    async fn test_transcode_missing_output() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockProcessRunner::new());
        runner.set_create_output(false);
        let t = transcoder(&dir, runner);
        let out = t.output_path("inv-1", "song");

        let err = t
            .transcode(Path::new("/in.webm"), &out, None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::OutputMissing { .. }));
    }

    #[tokio::test]
    async fn test_write_tags_replaces_file() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(MockProcessRunner::new());
        let t = transcoder(&dir, runner.clone());
        let out = t.output_path("inv-1", "song");
        tokio::fs::create_dir_all(out.parent().unwrap()).await.unwrap();
        tokio::fs::write(&out, b"untagged").await.unwrap();

        let tags = TrackTags {
            artist: "A".to_string(),
            title: "B".to_string(),
        };
        t.write_tags(&out, &tags, CancellationToken::new())
            .await
            .unwrap();

        assert!(out.exists());
        assert!(!FfmpegTranscoder::scratch_path(&out).exists());
        let call = &runner.invocations()[0];
        assert!(call.args.contains(&"artist=A".to_string()));
    }
}
