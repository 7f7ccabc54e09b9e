//! Work queue between the dispatcher and the worker pool.
//!
//! Messages travel as JSON (`{"job": ..., "clientSessionId": ...}`) so an
//! in-process queue and a remote one see the same payload.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::warn;

use crate::job::QueueMessage;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,

    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Failed to encode queue message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// At-least-once queue of conversion requests.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), QueueError>;

    /// Waits for the next message. `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<QueueMessage>;

    /// Number of messages waiting.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects further enqueues and wakes idle consumers.
    fn close(&self);
}

/// In-process FIFO [`JobQueue`].
#[derive(Debug)]
pub struct MemoryQueue {
    messages: Mutex<VecDeque<String>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    fn messages(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pop(&self) -> Option<String> {
        self.messages().pop_front()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let raw = serde_json::to_string(&message)?;
        {
            let mut messages = self.messages();
            if messages.len() >= self.capacity {
                return Err(QueueError::Full {
                    capacity: self.capacity,
                });
            }
            messages.push_back(raw);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<QueueMessage> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(raw) = self.pop() {
                match serde_json::from_str(&raw) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable queue message");
                        continue;
                    }
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    fn len(&self) -> usize {
        self.messages().len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
