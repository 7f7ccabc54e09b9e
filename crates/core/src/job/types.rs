//! Job item and queue message types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single conversion request and its outcome.
///
/// Created by the dispatcher, mutated by the worker, persisted as the
/// `index.json` sidecar next to the converted artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    /// Source video identifier; also the cache namespace.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, with = "super::duration")]
    pub duration: Duration,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Public URL of the converted artifact.
    #[serde(rename = "url", default)]
    pub storage_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// UTC, formatted `%Y-%m-%d %H:%M`.
    #[serde(default)]
    pub conversion_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_session_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl JobItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// True once the job has either an artifact URL or an error.
    pub fn is_ready(&self) -> bool {
        non_empty(&self.storage_url) || non_empty(&self.error)
    }

    pub fn has_error(&self) -> bool {
        non_empty(&self.error)
    }

    /// File name of the artifact, derived from the last segment of `storage_url`.
    pub fn file_name(&self) -> Option<String> {
        let url = self.storage_url.as_deref().filter(|u| !u.is_empty())?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let segment = path.trim_end_matches('/').rsplit('/').next()?;
        if segment.is_empty() {
            return None;
        }
        let decoded = urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string());
        Some(decoded)
    }

    /// Copy suitable for persisting: per-invocation routing fields are dropped.
    pub fn to_sidecar(&self) -> Self {
        Self {
            invocation_id: None,
            client_session_id: None,
            ..self.clone()
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::from(self)
    }
}

/// Job item plus computed fields, as sent to API clients and subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub item: JobItem,
    pub file_name: Option<String>,
    pub is_ready: bool,
}

impl From<&JobItem> for JobSnapshot {
    fn from(item: &JobItem) -> Self {
        Self {
            file_name: item.file_name(),
            is_ready: item.is_ready(),
            item: item.clone(),
        }
    }
}

impl From<JobItem> for JobSnapshot {
    fn from(item: JobItem) -> Self {
        Self {
            file_name: item.file_name(),
            is_ready: item.is_ready(),
            item,
        }
    }
}

/// Message placed on the work queue for each cache miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job: JobItem,
    pub client_session_id: String,
}

impl QueueMessage {
    pub fn new(job: JobItem, client_session_id: impl Into<String>) -> Self {
        Self {
            job,
            client_session_id: client_session_id.into(),
        }
    }
}
