//! Stream resolution through the yt-dlp command line tool.
//!
//! Metadata and the format list come from `yt-dlp --dump-single-json`; the
//! chosen stream is then fetched directly over HTTP.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ResolverConfig;
use super::error::ResolverError;
use super::traits::StreamResolver;
use crate::converter::replace_invalid_chars;
use super::types::{MediaStream, StreamKind, StreamManifest, VideoInfo};

#[derive(Debug, Deserialize)]
pub(crate) struct YtDlpVideo {
    id: String,
    #[serde(default)]
    title: String,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    height: Option<u32>,
    filesize: Option<u64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpFormat {
    fn into_stream(self) -> Option<MediaStream> {
        // Fragmented protocols (HLS, DASH) cannot be fetched with a single GET
        if let Some(protocol) = &self.protocol {
            if protocol != "https" && protocol != "http" {
                return None;
            }
        }
        let has_audio = self.acodec.as_deref().is_some_and(|c| c != "none");
        if !has_audio {
            return None;
        }
        let kind = match self.vcodec.as_deref() {
            Some("none") => StreamKind::AudioOnly,
            _ => StreamKind::Muxed,
        };
        let kbps = self.abr.or(self.tbr).unwrap_or(0.0);

        Some(MediaStream {
            url: self.url?,
            container: self
                .ext
                .map(|ext| replace_invalid_chars(ext.trim()))
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| "bin".to_string()),
            kind,
            bitrate: (kbps * 1000.0) as u64,
            video_quality: match kind {
                StreamKind::AudioOnly => 0,
                StreamKind::Muxed => self.height.unwrap_or(0),
            },
            size_bytes: self.filesize,
            http_headers: self.http_headers,
        })
    }
}

impl YtDlpVideo {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            duration: self
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or_default(),
            thumbnail: self.thumbnail.clone(),
        }
    }

    fn into_manifest(self) -> StreamManifest {
        StreamManifest::new(
            self.formats
                .into_iter()
                .filter_map(YtDlpFormat::into_stream)
                .collect(),
        )
    }
}

pub(crate) fn parse_video_json(raw: &[u8]) -> Result<YtDlpVideo, ResolverError> {
    serde_json::from_slice(raw).map_err(|e| ResolverError::Parse {
        reason: e.to_string(),
    })
}

/// [`StreamResolver`] that shells out to yt-dlp and downloads with reqwest.
pub struct YtDlpResolver {
    config: ResolverConfig,
    client: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { config, client })
    }

    async fn dump(&self, video_id: &str) -> Result<YtDlpVideo, ResolverError> {
        debug!(video_id, "Querying yt-dlp");
        let output = Command::new(&self.config.ytdlp_path)
            .args(["--dump-single-json", "--no-playlist", "--", video_id])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ResolverError::ToolNotFound {
                        path: self.config.ytdlp_path.display().to_string(),
                    }
                } else {
                    ResolverError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Video unavailable") || stderr.contains("Incomplete YouTube ID") {
                return Err(ResolverError::NotFound {
                    id: video_id.to_string(),
                });
            }
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp exited unsuccessfully")
                .to_string();
            return Err(ResolverError::command_failed(reason));
        }

        parse_video_json(&output.stdout)
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, ResolverError> {
        Ok(self.dump(video_id).await?.info())
    }

    async fn stream_manifest(&self, video_id: &str) -> Result<StreamManifest, ResolverError> {
        Ok(self.dump(video_id).await?.into_manifest())
    }

    async fn download(
        &self,
        stream: &MediaStream,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<u64, ResolverError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut request = self.client.get(&stream.url);
        for (name, value) in &stream.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            response = request.send() => response?.error_for_status()?,
        };

        let mut body = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(dest = %dest.display(), bytes = written, "Download finished");
        Ok(written)
    }
}
