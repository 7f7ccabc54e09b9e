//! Front door of the pipeline.
//!
//! For every requested id the dispatcher resolves display metadata and checks
//! the cache. Only genuine misses reach the work queue.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::job::{JobItem, QueueMessage, ENQUEUED_MESSAGE};
use crate::metrics::{DISPATCH_RESULTS, JOBS_ENQUEUED};
use crate::queue::JobQueue;
use crate::resolver::StreamResolver;

/// Splits a raw id list on newlines, commas and spaces.
///
/// Empty tokens are dropped and duplicates removed, keeping first-seen order.
pub fn parse_video_ids(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| c == '\n' || c == '\r' || c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

pub struct JobDispatcher {
    resolver: Arc<dyn StreamResolver>,
    cache: Arc<CacheStore>,
    queue: Arc<dyn JobQueue>,
}

impl JobDispatcher {
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        cache: Arc<CacheStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            resolver,
            cache,
            queue,
        }
    }

    /// Dispatches every id concurrently and returns one item per id, in
    /// request order.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn dispatch(&self, ids: &[String], client_session_id: &str) -> Vec<JobItem> {
        let items = join_all(
            ids.iter()
                .map(|id| self.dispatch_one(id, client_session_id)),
        )
        .await;
        info!(
            requested = ids.len(),
            enqueued = items.iter().filter(|i| i.invocation_id.is_some()).count(),
            "Dispatch finished"
        );
        items
    }

    async fn dispatch_one(&self, id: &str, client_session_id: &str) -> JobItem {
        let mut item = match self.resolver.video_info(id).await {
            Ok(info) => info.to_job_item(),
            Err(e) => {
                warn!(video_id = id, error = %e, "Failed to resolve video");
                let mut item = JobItem::new(id);
                item.error = Some(e.to_string());
                item
            }
        };

        match self.cache.lookup(id).await {
            Ok(Some(hit)) => {
                debug!(video_id = id, url = %hit.url, "Already converted");
                if item.conversion_date.is_none() {
                    item.conversion_date = hit.sidecar.and_then(|s| s.conversion_date);
                }
                item.storage_url = Some(hit.url);
                DISPATCH_RESULTS.with_label_values(&["hit"]).inc();
                return item;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(video_id = id, error = %e, "Cache lookup failed");
                if !item.has_error() {
                    item.error = Some(e.to_string());
                }
            }
        }

        if item.is_ready() {
            DISPATCH_RESULTS.with_label_values(&["error"]).inc();
            return item;
        }

        item.invocation_id = Some(Uuid::new_v4().to_string());
        item.client_session_id = Some(client_session_id.to_string());
        item.set_message(ENQUEUED_MESSAGE);

        match self
            .queue
            .enqueue(QueueMessage::new(item.clone(), client_session_id))
            .await
        {
            Ok(()) => {
                JOBS_ENQUEUED.inc();
                DISPATCH_RESULTS.with_label_values(&["miss"]).inc();
                debug!(video_id = id, invocation_id = ?item.invocation_id, "Enqueued");
            }
            Err(e) => {
                warn!(video_id = id, error = %e, "Failed to enqueue");
                item.invocation_id = None;
                item.message = None;
                item.error = Some(e.to_string());
                DISPATCH_RESULTS.with_label_values(&["error"]).inc();
            }
        }
        item
    }
}
