use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::error::StorageError;

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Slash-separated key, e.g. `abc123/index.json`.
    pub key: String,
    pub size_bytes: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct BlobPage {
    pub entries: Vec<BlobEntry>,
    /// Pass back to [`BlobStore::list`] to fetch the next page.
    pub continuation: Option<String>,
}

/// Flat key/value object storage with folder-like prefixes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a local file under `key` and returns its public URL.
    async fn put_file(
        &self,
        key: &str,
        source: &Path,
        cancel: CancellationToken,
    ) -> Result<String, StorageError>;

    /// Stores `bytes` under `key` and returns its public URL.
    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<String, StorageError>;

    /// Removes an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Reads an object. `Ok(None)` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Lists keys starting with `prefix` in lexical order, at most `limit` per page.
    async fn list(
        &self,
        prefix: &str,
        continuation: Option<String>,
        limit: usize,
    ) -> Result<BlobPage, StorageError>;

    /// Public URL of `key`.
    fn url_for(&self, key: &str) -> String;
}
