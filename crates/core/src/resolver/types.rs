//! Video metadata and stream manifest types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::job::JobItem;

/// Display metadata for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub duration: Duration,
    pub thumbnail: Option<String>,
}

impl VideoInfo {
    /// Fresh job item carrying this video's display metadata.
    pub fn to_job_item(&self) -> JobItem {
        JobItem {
            title: self.title.clone(),
            duration: self.duration,
            thumbnail: self.thumbnail.clone(),
            ..JobItem::new(self.id.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Audio track without video.
    AudioOnly,
    /// Audio and video in one container.
    Muxed,
}

/// One downloadable rendition of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub url: String,
    /// Container extension, e.g. `webm` or `m4a`.
    pub container: String,
    pub kind: StreamKind,
    /// Bits per second.
    pub bitrate: u64,
    /// Vertical resolution; zero for audio-only streams.
    pub video_quality: u32,
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamManifest {
    pub streams: Vec<MediaStream>,
}

impl StreamManifest {
    pub fn new(streams: Vec<MediaStream>) -> Self {
        Self { streams }
    }

    /// Audio-only stream with the highest bitrate, else the muxed stream with
    /// the highest video quality.
    pub fn best_audio(&self) -> Option<&MediaStream> {
        let audio_only = self
            .streams
            .iter()
            .filter(|s| s.kind == StreamKind::AudioOnly)
            .max_by_key(|s| s.bitrate);
        if audio_only.is_some() {
            return audio_only;
        }
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Muxed)
            .max_by_key(|s| (s.video_quality, s.bitrate))
    }
}
