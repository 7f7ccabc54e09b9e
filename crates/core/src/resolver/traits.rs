use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::error::ResolverError;
use super::types::{MediaStream, StreamManifest, VideoInfo};

/// Looks up videos and fetches their media.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Display metadata (title, duration, thumbnail).
    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, ResolverError>;

    /// All downloadable streams of the video.
    async fn stream_manifest(&self, video_id: &str) -> Result<StreamManifest, ResolverError>;

    /// Writes `stream` to `dest`, returning the number of bytes written.
    ///
    /// Checks `cancel` between chunks and returns [`ResolverError::Cancelled`]
    /// once it fires.
    async fn download(
        &self,
        stream: &MediaStream,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<u64, ResolverError>;
}
