//! Core of the tubetone conversion service.
//!
//! Requests flow through the [`dispatcher`], which answers from the [`cache`]
//! or enqueues a [`job::QueueMessage`]. The [`worker`] pool turns each message
//! into an audio artifact and publishes progress through a [`notifier`].

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod job;
pub mod metrics;
pub mod notifier;
pub mod progress;
pub mod queue;
pub mod resolver;
pub mod testing;
pub mod worker;

pub use cache::{BlobStore, CacheStore, CachedArtifact, FsBlobStore, StorageError};
pub use cancellation::{CancellationRegistry, InMemoryCancellationRegistry};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use converter::{
    ConverterConfig, ConverterError, FfmpegTranscoder, ProcessRunner, TokioProcessRunner,
};
pub use dispatcher::{parse_video_ids, JobDispatcher};
pub use job::{JobItem, JobSnapshot, JobStage, QueueMessage};
pub use notifier::{BroadcastNotifier, Notification, Notifier};
pub use progress::{parse_progress_line, ProgressTracker};
pub use queue::{JobQueue, MemoryQueue, QueueError};
pub use resolver::{ResolverConfig, ResolverError, StreamResolver, YtDlpResolver};
pub use worker::{
    ConversionError, ConversionWorker, JobOutcome, NotificationRouting, WorkerConfig, WorkerPool,
};
