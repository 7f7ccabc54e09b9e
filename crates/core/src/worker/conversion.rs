//! Per-job conversion state machine.
//!
//! `Processing -> Downloading -> Converting -> Storing -> Done`, with `Failed`
//! and `Cancelled` reachable from every non-terminal stage. Each stage starts
//! with a cancellation check and a notification; the terminal step always
//! cleans up and publishes the final snapshot.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Span};
use uuid::Uuid;

use super::config::WorkerConfig;
use super::error::ConversionError;
use crate::cache::CacheStore;
use crate::cancellation::CancellationRegistry;
use crate::converter::{extract_tags, FfmpegTranscoder};
use crate::job::{converting_message, JobItem, JobStage, QueueMessage, CANCELLED_MESSAGE};
use crate::metrics::{
    BYTES_DOWNLOADED, CONVERSIONS_TOTAL, CONVERSION_DURATION, CONVERSION_FAILURES, JOBS_IN_FLIGHT,
    JOB_DURATION, VIDEO_DURATION,
};
use crate::notifier::Notifier;
use crate::progress::ProgressTracker;
use crate::resolver::{MediaStream, ResolverError, StreamResolver};

const LINE_BUFFER: usize = 64;

/// Final state of one processed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub item: JobItem,
    /// One of `Done`, `Failed` or `Cancelled`.
    pub stage: JobStage,
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        self.stage == JobStage::Done
    }
}

/// Mutable state of one invocation.
struct JobRun {
    job: JobItem,
    invocation_id: String,
    /// Names this attempt's scratch files. Redelivery can run one invocation
    /// twice at once, so it is unique per attempt.
    work_id: String,
    routing_key: String,
    cancel: CancellationToken,
    download_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
}

/// Runs queued jobs through resolution, download, transcoding and storage.
pub struct ConversionWorker {
    config: WorkerConfig,
    resolver: Arc<dyn StreamResolver>,
    transcoder: Arc<FfmpegTranscoder>,
    cache: Arc<CacheStore>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<dyn CancellationRegistry>,
}

impl ConversionWorker {
    pub fn new(
        config: WorkerConfig,
        resolver: Arc<dyn StreamResolver>,
        transcoder: Arc<FfmpegTranscoder>,
        cache: Arc<CacheStore>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<dyn CancellationRegistry>,
    ) -> Self {
        Self {
            config,
            resolver,
            transcoder,
            cache,
            notifier,
            registry,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Processes one queue message to a terminal stage. Never fails: faults
    /// end up in the returned item's `error`.
    #[instrument(
        skip(self, message),
        fields(video_id = %message.job.id, invocation_id = tracing::field::Empty)
    )]
    pub async fn process(&self, message: QueueMessage) -> JobOutcome {
        let started = Instant::now();
        JOBS_IN_FLIGHT.inc();

        let QueueMessage {
            mut job,
            client_session_id,
        } = message;
        let invocation_id = job
            .invocation_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Span::current().record("invocation_id", invocation_id.as_str());
        job.invocation_id = Some(invocation_id.clone());
        job.client_session_id = Some(client_session_id.clone());
        job.error = None;

        let mut run = JobRun {
            routing_key: self.config.routing_key(&client_session_id).to_string(),
            cancel: self.registry.token(&invocation_id),
            work_id: format!("{}-{}", invocation_id, Uuid::new_v4().simple()),
            invocation_id,
            job,
            download_path: None,
            output_path: None,
        };

        let stage = match self.run_stages(&mut run).await {
            Ok(()) => {
                info!(url = ?run.job.storage_url, "Conversion finished");
                VIDEO_DURATION
                    .with_label_values(&[])
                    .observe(run.job.duration.as_secs_f64());
                JobStage::Done
            }
            Err(ConversionError::Cancelled) => {
                info!("Conversion cancelled");
                run.job.error = Some(CANCELLED_MESSAGE.to_string());
                JobStage::Cancelled
            }
            Err(e) => {
                error!(video_id = %run.job.id, kind = e.kind(), error = %e, "Conversion failed");
                CONVERSION_FAILURES.with_label_values(&[e.kind()]).inc();
                run.job.error = Some(e.to_string());
                JobStage::Failed
            }
        };

        self.finish(&mut run).await;

        let elapsed = started.elapsed();
        CONVERSIONS_TOTAL.with_label_values(&[stage.as_str()]).inc();
        JOB_DURATION
            .with_label_values(&[stage.as_str()])
            .observe(elapsed.as_secs_f64());
        JOBS_IN_FLIGHT.dec();

        JobOutcome {
            item: run.job,
            stage,
            elapsed,
        }
    }

    async fn run_stages(&self, run: &mut JobRun) -> Result<(), ConversionError> {
        self.enter(run, JobStage::Processing)?;
        if run.job.title.is_empty() {
            let info = self.resolver.video_info(&run.job.id).await?;
            run.job.title = info.title;
            run.job.duration = info.duration;
            run.job.thumbnail = run.job.thumbnail.take().or(info.thumbnail);
        }
        let manifest = self.resolver.stream_manifest(&run.job.id).await?;
        let stream = manifest
            .best_audio()
            .cloned()
            .ok_or(ResolverError::NoStreams)?;
        debug!(
            container = %stream.container,
            kind = ?stream.kind,
            bitrate = stream.bitrate,
            "Selected stream"
        );

        self.enter(run, JobStage::Downloading)?;
        let download_path = self.download_path(&run.work_id, &stream);
        run.download_path = Some(download_path.clone());
        if let Some(parent) = download_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConversionError::transfer(format!("Failed to create download directory: {}", e))
            })?;
        }
        let bytes = self
            .resolver
            .download(&stream, &download_path, run.cancel.clone())
            .await?;
        BYTES_DOWNLOADED.inc_by(bytes);
        debug!(bytes, path = %download_path.display(), "Downloaded");

        self.enter(run, JobStage::Converting)?;
        let output_path = self
            .transcoder
            .output_path(&run.work_id, &run.job.title);
        run.output_path = Some(output_path.clone());
        self.convert(run, &download_path, &output_path).await?;

        if let Some(tags) = extract_tags(&run.job.title) {
            self.check_cancelled(run)?;
            self.transcoder
                .write_tags(&output_path, &tags, run.cancel.clone())
                .await?;
        }

        self.enter(run, JobStage::Storing)?;
        let url = self
            .cache
            .put_artifact(&run.job.id, &output_path, run.cancel.clone())
            .await?;
        run.job.storage_url = Some(url);
        run.job.conversion_date = Some(Utc::now().format("%Y-%m-%d %H:%M").to_string());
        run.job.message = None;
        self.cache
            .put_metadata(&run.job.id, &run.job, run.cancel.clone())
            .await?;
        Ok(())
    }

    /// Runs the transcoder while feeding its stderr through the progress parser.
    async fn convert(
        &self,
        run: &mut JobRun,
        input: &Path,
        output: &Path,
    ) -> Result<(), ConversionError> {
        let started = Instant::now();
        let total = run.job.duration;
        let mut tracker = ProgressTracker::new();
        let (tx, mut rx) = mpsc::channel::<String>(LINE_BUFFER);

        let transcode = self
            .transcoder
            .transcode(input, output, Some(tx), run.cancel.clone());
        tokio::pin!(transcode);

        let result = loop {
            tokio::select! {
                result = &mut transcode => break result,
                Some(line) = rx.recv() => self.observe_line(run, &mut tracker, &line, total),
            }
        };
        while let Ok(line) = rx.try_recv() {
            self.observe_line(run, &mut tracker, &line, total);
        }

        CONVERSION_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());
        result?;
        Ok(())
    }

    fn observe_line(&self, run: &mut JobRun, tracker: &mut ProgressTracker, line: &str, total: Duration) {
        if self.registry.is_cancelled(&run.invocation_id) {
            run.cancel.cancel();
            return;
        }
        if let Some(percent) = tracker.observe_line(line, total) {
            run.job.set_message(converting_message(percent));
            self.publish(run);
        }
    }

    fn check_cancelled(&self, run: &JobRun) -> Result<(), ConversionError> {
        if self.registry.is_cancelled(&run.invocation_id) || run.cancel.is_cancelled() {
            run.cancel.cancel();
            return Err(ConversionError::Cancelled);
        }
        Ok(())
    }

    fn enter(&self, run: &mut JobRun, stage: JobStage) -> Result<(), ConversionError> {
        self.check_cancelled(run)?;
        debug!(stage = %stage, "Entering stage");
        run.job.set_message(stage.message());
        self.publish(run);
        Ok(())
    }

    fn publish(&self, run: &JobRun) {
        self.notifier.publish(&run.routing_key, &run.job);
    }

    fn download_path(&self, work_id: &str, stream: &MediaStream) -> PathBuf {
        let extension = if stream.container.is_empty() {
            "bin"
        } else {
            stream.container.as_str()
        };
        self.transcoder
            .config()
            .temp_dir
            .join(format!("{}.{}", work_id, extension))
    }

    /// Terminal step: always runs, ignores cleanup faults.
    async fn finish(&self, run: &mut JobRun) {
        if let Some(path) = &run.download_path {
            let _ = tokio::fs::remove_file(path).await;
        }
        if let Some(path) = &run.output_path {
            let _ = tokio::fs::remove_file(path).await;
            let _ = tokio::fs::remove_file(FfmpegTranscoder::scratch_path(path)).await;
        }
        let _ = tokio::fs::remove_dir_all(self.transcoder.work_dir(&run.work_id)).await;

        self.registry.clear(&run.invocation_id);
        run.job.message = None;
        self.publish(run);
    }
}
