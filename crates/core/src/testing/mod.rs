//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of all external capability
//! traits, allowing the whole pipeline to run without yt-dlp, ffmpeg or a
//! real blob store.
//!
//! # Example
//!
//! ```rust,ignore
//! use tubetone_core::testing::{fixtures, MockProcessRunner, MockResolver, RecordingNotifier};
//!
//! let resolver = MockResolver::new();
//! resolver.add_video(fixtures::video_info("abc123", "Daft Punk - One More Time", 180));
//!
//! let runner = MockProcessRunner::new();
//! runner.set_stderr_lines(vec![fixtures::progress_line("00:01:30.00")]);
//!
//! // Wire into a ConversionWorker...
//! ```

use std::sync::{Mutex, MutexGuard};

mod mock_blob_store;
mod mock_process_runner;
mod mock_resolver;
mod recording_notifier;

pub use mock_blob_store::MockBlobStore;
pub use mock_process_runner::{MockProcessRunner, RecordedInvocation};
pub use mock_resolver::MockResolver;
pub use recording_notifier::RecordingNotifier;

/// Locks a mock's state, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::job::{JobItem, QueueMessage};
    use crate::resolver::{MediaStream, StreamKind, VideoInfo};

    /// Create test video metadata.
    pub fn video_info(id: &str, title: &str, duration_secs: u64) -> VideoInfo {
        VideoInfo {
            id: id.to_string(),
            title: title.to_string(),
            duration: Duration::from_secs(duration_secs),
            thumbnail: Some(format!("https://img.example/{}/default.jpg", id)),
        }
    }

    /// Create an audio-only stream with the given bitrate (bits per second).
    pub fn audio_stream(bitrate: u64) -> MediaStream {
        MediaStream {
            url: format!("https://media.example/audio/{}", bitrate),
            container: "webm".to_string(),
            kind: StreamKind::AudioOnly,
            bitrate,
            video_quality: 0,
            size_bytes: None,
            http_headers: HashMap::new(),
        }
    }

    /// Create a muxed audio/video stream.
    pub fn muxed_stream(video_quality: u32) -> MediaStream {
        MediaStream {
            url: format!("https://media.example/muxed/{}", video_quality),
            container: "mp4".to_string(),
            kind: StreamKind::Muxed,
            bitrate: 1_000_000,
            video_quality,
            size_bytes: None,
            http_headers: HashMap::new(),
        }
    }

    /// An ffmpeg stderr progress line at `time` (`HH:MM:SS.ms`).
    pub fn progress_line(time: &str) -> String {
        format!(
            "size=     256kB time={} bitrate= 128.0kbits/s speed=8.00x",
            time
        )
    }

    /// A queue message for `info`, with an invocation id already assigned.
    pub fn queue_message(info: &VideoInfo, invocation_id: &str, session: &str) -> QueueMessage {
        let mut job: JobItem = info.to_job_item();
        job.invocation_id = Some(invocation_id.to_string());
        job.client_session_id = Some(session.to_string());
        QueueMessage::new(job, session)
    }
}
