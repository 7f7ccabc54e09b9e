//! Notifier that keeps every published snapshot.

use std::sync::Mutex;

use super::lock;
use crate::job::JobItem;
use crate::notifier::{Notification, Notifier};

/// Mock implementation of the Notifier trait.
///
/// Records notifications in publish order for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    /// The `message` field of every notification, in order.
    pub fn messages(&self) -> Vec<Option<String>> {
        lock(&self.notifications)
            .iter()
            .map(|n| n.item.item.message.clone())
            .collect()
    }

    /// Notifications for one video id.
    pub fn for_video(&self, video_id: &str) -> Vec<Notification> {
        lock(&self.notifications)
            .iter()
            .filter(|n| n.item.item.id == video_id)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<Notification> {
        lock(&self.notifications).last().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.notifications).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.notifications).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.notifications).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, routing_key: &str, item: &JobItem) {
        lock(&self.notifications).push(Notification {
            routing_key: routing_key.to_string(),
            item: item.snapshot(),
        });
    }
}
