use serde::{Deserialize, Serialize};

/// Where job notifications are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationRouting {
    /// Every job on one shared channel.
    #[default]
    Broadcast,
    /// Each job on the session that requested it.
    Session,
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of jobs processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub routing: NotificationRouting,

    /// Channel name used with [`NotificationRouting::Broadcast`].
    #[serde(default = "default_broadcast_channel")]
    pub broadcast_channel: String,

    /// Messages the in-process queue holds before rejecting enqueues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds a terminate request for a job no worker has picked up is kept.
    #[serde(default = "default_cancel_pending_ttl_secs")]
    pub cancel_pending_ttl_secs: u64,

    /// Unclaimed terminate requests kept at most.
    #[serde(default = "default_cancel_max_pending")]
    pub cancel_max_pending: usize,
}

fn default_concurrency() -> usize {
    2
}

fn default_broadcast_channel() -> String {
    "broadcast".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_cancel_pending_ttl_secs() -> u64 {
    3600
}

fn default_cancel_max_pending() -> usize {
    10_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            routing: NotificationRouting::default(),
            broadcast_channel: default_broadcast_channel(),
            queue_capacity: default_queue_capacity(),
            cancel_pending_ttl_secs: default_cancel_pending_ttl_secs(),
            cancel_max_pending: default_cancel_max_pending(),
        }
    }
}

impl WorkerConfig {
    /// Routing key for a job requested by `client_session_id`.
    pub fn routing_key<'a>(&'a self, client_session_id: &'a str) -> &'a str {
        match self.routing {
            NotificationRouting::Broadcast => &self.broadcast_channel,
            NotificationRouting::Session => client_session_id,
        }
    }

    pub fn cancel_pending_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cancel_pending_ttl_secs)
    }

    pub fn with_routing(mut self, routing: NotificationRouting) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}
