//! In-memory blob store for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::lock;
use crate::cache::{BlobEntry, BlobPage, BlobStore, StorageError};

/// Mock implementation of the BlobStore trait.
///
/// Objects live in a sorted map; URLs are `mock://blobs/<key>`.
#[derive(Debug)]
pub struct MockBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    /// Every following upload fails.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed(key, "mock upload failure"));
        }
        lock(&self.objects).insert(key.to_string(), bytes);
        Ok(self.url_for(key))
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put_file(
        &self,
        key: &str,
        source: &Path,
        cancel: CancellationToken,
    ) -> Result<String, StorageError> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        let bytes = tokio::fs::read(source).await?;
        self.store(key, bytes)
    }

    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<String, StorageError> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        self.store(key, bytes)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.objects).remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(lock(&self.objects).get(key).cloned())
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<String>,
        limit: usize,
    ) -> Result<BlobPage, StorageError> {
        let limit = limit.max(1);
        let objects = lock(&self.objects);
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| match &continuation {
                Some(after) => key.as_str() > after.as_str(),
                None => true,
            })
            .map(|(key, bytes)| BlobEntry {
                key: key.clone(),
                size_bytes: bytes.len() as u64,
            })
            .peekable();

        let mut entries = Vec::new();
        while entries.len() < limit {
            match matching.next() {
                Some(entry) => entries.push(entry),
                None => break,
            }
        }
        let continuation = if matching.peek().is_some() {
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };
        Ok(BlobPage {
            entries,
            continuation,
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!("mock://blobs/{}", key)
    }
}
