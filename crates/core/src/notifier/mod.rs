//! One-way push of job snapshots to connected clients.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::job::{JobItem, JobSnapshot};
use crate::metrics::NOTIFICATIONS_PUBLISHED;

/// Publishes job snapshots under a routing key.
///
/// The key is either a shared channel name or a client session id, depending
/// on how the worker is configured.
pub trait Notifier: Send + Sync {
    fn publish(&self, routing_key: &str, item: &JobItem);
}

/// One published snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub routing_key: String,
    pub item: JobSnapshot,
}

/// [`Notifier`] fanning out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, routing_key: &str, item: &JobItem) {
        NOTIFICATIONS_PUBLISHED.inc();
        trace!(routing_key, video_id = %item.id, message = ?item.message, "Publishing");
        // No subscribers is not an error
        let _ = self.sender.send(Notification {
            routing_key: routing_key.to_string(),
            item: item.snapshot(),
        });
    }
}
