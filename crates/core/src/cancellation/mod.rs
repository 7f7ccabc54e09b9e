//! Cooperative cancellation of in-flight conversions.
//!
//! A terminate request marks an invocation id as cancelled. The worker polls the
//! registry at every stage boundary and threads the id's [`CancellationToken`]
//! through download, transcoding and upload so sub-operations can stop early.
//!
//! A request may arrive before a worker picks the job up, so requests for ids
//! no worker holds yet are kept. They expire after a configurable time and
//! their number is capped.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default lifetime of a cancellation no worker has claimed.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(3600);

/// Default cap on unclaimed cancellations.
pub const DEFAULT_MAX_PENDING: usize = 10_000;

/// Shared set of invocation ids whose cancellation was requested.
pub trait CancellationRegistry: Send + Sync {
    /// Mark an invocation as cancelled. Idempotent.
    fn request_cancel(&self, invocation_id: &str);

    /// Whether cancellation was requested for this invocation.
    fn is_cancelled(&self, invocation_id: &str) -> bool;

    /// Forget an invocation. Idempotent.
    fn clear(&self, invocation_id: &str);

    /// Token for this invocation, created on first use. Called by the worker
    /// that runs the invocation; the entry then lives until [`clear`].
    ///
    /// A token obtained before `request_cancel` observes the cancellation.
    ///
    /// [`clear`]: CancellationRegistry::clear
    fn token(&self, invocation_id: &str) -> CancellationToken;
}

#[derive(Debug)]
struct Entry {
    token: CancellationToken,
    /// Set while no worker holds the invocation.
    pending_since: Option<Instant>,
}

/// [`CancellationRegistry`] backed by a concurrent map of tokens.
#[derive(Debug)]
pub struct InMemoryCancellationRegistry {
    entries: DashMap<String, Entry>,
    pending_ttl: Duration,
    max_pending: usize,
}

impl Default for InMemoryCancellationRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_PENDING_TTL, DEFAULT_MAX_PENDING)
    }
}

impl InMemoryCancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unclaimed requests older than `pending_ttl` are dropped; beyond
    /// `max_pending` the oldest unclaimed request is evicted.
    pub fn with_limits(pending_ttl: Duration, max_pending: usize) -> Self {
        Self {
            entries: DashMap::new(),
            pending_ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Number of tracked invocations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired unclaimed requests. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.pending_ttl;
        self.entries.retain(|_, entry| match entry.pending_since {
            Some(since) => since.elapsed() < ttl,
            None => true,
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Expired unclaimed cancellations");
        }
        removed
    }

    fn evict_oldest_pending(&self) {
        while self.pending_count() >= self.max_pending {
            let oldest = self
                .entries
                .iter()
                .filter_map(|e| e.pending_since.map(|since| (e.key().clone(), since)))
                .min_by_key(|(_, since)| *since)
                .map(|(key, _)| key);
            match oldest {
                Some(key) => {
                    debug!(invocation_id = %key, "Evicting unclaimed cancellation");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.pending_since.is_some())
            .count()
    }
}

impl CancellationRegistry for InMemoryCancellationRegistry {
    fn request_cancel(&self, invocation_id: &str) {
        debug!(invocation_id, "Cancellation requested");
        if let Some(entry) = self.entries.get(invocation_id) {
            entry.token.cancel();
            return;
        }

        self.sweep_expired();
        self.evict_oldest_pending();
        let entry = self
            .entries
            .entry(invocation_id.to_string())
            .or_insert_with(|| Entry {
                token: CancellationToken::new(),
                pending_since: Some(Instant::now()),
            });
        entry.token.cancel();
    }

    fn is_cancelled(&self, invocation_id: &str) -> bool {
        self.entries
            .get(invocation_id)
            .map(|e| e.token.is_cancelled())
            .unwrap_or(false)
    }

    fn clear(&self, invocation_id: &str) {
        self.entries.remove(invocation_id);
    }

    fn token(&self, invocation_id: &str) -> CancellationToken {
        let mut entry = self
            .entries
            .entry(invocation_id.to_string())
            .or_insert_with(|| Entry {
                token: CancellationToken::new(),
                pending_since: None,
            });
        entry.pending_since = None;
        entry.token.clone()
    }
}
