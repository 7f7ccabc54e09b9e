//! Mock stream resolver for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::lock;
use crate::cancellation::CancellationRegistry;
use crate::resolver::{MediaStream, ResolverError, StreamManifest, StreamResolver, VideoInfo};

/// Mock implementation of the StreamResolver trait.
///
/// Known videos resolve to their registered [`VideoInfo`]; unknown ids fail
/// with [`ResolverError::NotFound`]. A known video without registered streams
/// gets a single audio-only stream.
pub struct MockResolver {
    videos: Mutex<HashMap<String, VideoInfo>>,
    streams: Mutex<HashMap<String, Vec<MediaStream>>>,
    media: Mutex<Vec<u8>>,
    downloads: Mutex<Vec<String>>,
    download_error: Mutex<Option<String>>,
    /// Requests cancellation of an invocation when a download starts.
    cancel_hook: Mutex<Option<(Arc<dyn CancellationRegistry>, String)>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            videos: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            media: Mutex::new(b"mock media".to_vec()),
            downloads: Mutex::new(Vec::new()),
            download_error: Mutex::new(None),
            cancel_hook: Mutex::new(None),
        }
    }

    pub fn add_video(&self, info: VideoInfo) {
        lock(&self.videos).insert(info.id.clone(), info);
    }

    pub fn set_streams(&self, video_id: &str, streams: Vec<MediaStream>) {
        lock(&self.streams).insert(video_id.to_string(), streams);
    }

    pub fn set_media(&self, bytes: Vec<u8>) {
        *lock(&self.media) = bytes;
    }

    /// Every following download fails with a transfer error.
    pub fn fail_downloads(&self, reason: &str) {
        *lock(&self.download_error) = Some(reason.to_string());
    }

    /// Simulates a terminate request arriving mid-download.
    pub fn cancel_on_download(&self, registry: Arc<dyn CancellationRegistry>, invocation_id: &str) {
        *lock(&self.cancel_hook) = Some((registry, invocation_id.to_string()));
    }

    /// URLs of every download started so far.
    pub fn downloads(&self) -> Vec<String> {
        lock(&self.downloads).clone()
    }
}

#[async_trait]
impl StreamResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, ResolverError> {
        lock(&self.videos)
            .get(video_id)
            .cloned()
            .ok_or_else(|| ResolverError::NotFound {
                id: video_id.to_string(),
            })
    }

    async fn stream_manifest(&self, video_id: &str) -> Result<StreamManifest, ResolverError> {
        let streams = lock(&self.streams).get(video_id).cloned();
        if let Some(streams) = streams {
            return Ok(StreamManifest::new(streams));
        }
        if lock(&self.videos).contains_key(video_id) {
            return Ok(StreamManifest::new(vec![super::fixtures::audio_stream(
                128_000,
            )]));
        }
        Err(ResolverError::NotFound {
            id: video_id.to_string(),
        })
    }

    async fn download(
        &self,
        stream: &MediaStream,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<u64, ResolverError> {
        lock(&self.downloads).push(stream.url.clone());

        let hook = lock(&self.cancel_hook).clone();
        if let Some((registry, invocation_id)) = hook {
            registry.request_cancel(&invocation_id);
        }
        if cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        let download_error = lock(&self.download_error).clone();
        if let Some(reason) = download_error {
            return Err(ResolverError::download(reason));
        }

        let media = lock(&self.media).clone();
        tokio::fs::write(dest, &media).await?;
        Ok(media.len() as u64)
    }
}
