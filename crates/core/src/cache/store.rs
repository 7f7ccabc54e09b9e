//! Content-addressed cache of converted artifacts.
//!
//! Every video id owns the namespace `<id>/`, holding the converted audio
//! file and an `index.json` sidecar with the last-known [`JobItem`].

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::StorageError;
use super::traits::{BlobEntry, BlobStore};
use crate::job::JobItem;

/// Name of the metadata object inside each namespace.
pub const SIDECAR_NAME: &str = "index.json";

/// Result of a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtifact {
    pub id: String,
    /// URL of the audio object, or of the sidecar if no audio object exists.
    pub url: String,
    /// Parsed sidecar, if present and readable.
    pub sidecar: Option<JobItem>,
}

pub struct CacheStore {
    blobs: Arc<dyn BlobStore>,
    page_size: usize,
}

fn sidecar_key(id: &str) -> String {
    format!("{}/{}", id, SIDECAR_NAME)
}

fn is_sidecar(key: &str) -> bool {
    key.rsplit('/').next() == Some(SIDECAR_NAME)
}

fn check_id(id: &str) -> Result<(), StorageError> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(StorageError::InvalidKey { key: id.to_string() });
    }
    Ok(())
}

impl CacheStore {
    pub fn new(blobs: Arc<dyn BlobStore>, page_size: usize) -> Self {
        Self {
            blobs,
            page_size: page_size.max(1),
        }
    }

    /// Every object under `prefix`, following continuation tokens.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut continuation = None;
        loop {
            let page = self
                .blobs
                .list(prefix, continuation.take(), self.page_size)
                .await?;
            entries.extend(page.entries);
            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }

    async fn read_sidecar(&self, key: &str) -> Option<JobItem> {
        let bytes = match self.blobs.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read sidecar");
                return None;
            }
        };
        match serde_json::from_slice::<JobItem>(&bytes) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(key, error = %e, "Skipping unparsable sidecar");
                None
            }
        }
    }

    /// Present iff the namespace of `id` holds any object.
    pub async fn lookup(&self, id: &str) -> Result<Option<CachedArtifact>, StorageError> {
        check_id(id)?;
        let entries = self.list_prefix(&format!("{}/", id)).await?;
        if entries.is_empty() {
            debug!(video_id = id, "Cache miss");
            return Ok(None);
        }

        let sidecar = if entries.iter().any(|e| is_sidecar(&e.key)) {
            self.read_sidecar(&sidecar_key(id)).await
        } else {
            None
        };

        // The sidecar names the current artifact; fall back to whatever the
        // namespace holds when it is missing or has no URL.
        let url = sidecar
            .as_ref()
            .and_then(|s| s.storage_url.clone())
            .filter(|u| !u.is_empty())
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| !is_sidecar(&e.key))
                    .map(|artifact| self.blobs.url_for(&artifact.key))
            })
            .unwrap_or_else(|| self.blobs.url_for(&sidecar_key(id)));

        debug!(video_id = id, url = %url, "Cache hit");
        Ok(Some(CachedArtifact {
            id: id.to_string(),
            url,
            sidecar,
        }))
    }

    /// Uploads the converted file into the namespace of `id`, keeping its file name.
    ///
    /// Any other artifact in the namespace (left by a conversion under a
    /// previous title) is removed once the upload succeeds.
    pub async fn put_artifact(
        &self,
        id: &str,
        local_path: &Path,
        cancel: CancellationToken,
    ) -> Result<String, StorageError> {
        check_id(id)?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StorageError::InvalidKey {
                key: local_path.display().to_string(),
            })?;
        let key = format!("{}/{}", id, file_name);
        let url = self.blobs.put_file(&key, local_path, cancel).await?;
        self.remove_stale_artifacts(id, &key).await;
        Ok(url)
    }

    async fn remove_stale_artifacts(&self, id: &str, current: &str) {
        let entries = match self.list_prefix(&format!("{}/", id)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(video_id = id, error = %e, "Failed to list namespace for cleanup");
                return;
            }
        };
        for entry in entries
            .iter()
            .filter(|e| e.key != current && !is_sidecar(&e.key))
        {
            match self.blobs.delete(&entry.key).await {
                Ok(()) => debug!(video_id = id, key = %entry.key, "Removed stale artifact"),
                Err(e) => warn!(key = %entry.key, error = %e, "Failed to remove stale artifact"),
            }
        }
    }

    /// Writes the sidecar for `id`. Routing fields of `item` are not persisted.
    pub async fn put_metadata(
        &self,
        id: &str,
        item: &JobItem,
        cancel: CancellationToken,
    ) -> Result<String, StorageError> {
        check_id(id)?;
        let bytes = serde_json::to_vec_pretty(&item.to_sidecar())?;
        self.blobs.put_bytes(&sidecar_key(id), bytes, cancel).await
    }

    /// Last-known snapshot of every cached job. Sidecars within a page are read
    /// concurrently; unreadable ones are skipped.
    pub async fn list_all(&self) -> Result<Vec<JobItem>, StorageError> {
        let mut items = Vec::new();
        let mut continuation = None;
        loop {
            let page = self
                .blobs
                .list("", continuation.take(), self.page_size)
                .await?;

            let reads = page
                .entries
                .iter()
                .filter(|e| is_sidecar(&e.key))
                .map(|e| self.read_sidecar(&e.key));
            items.extend(join_all(reads).await.into_iter().flatten());

            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsBlobStore;
    use tempfile::TempDir;

    fn new_cache(dir: &TempDir, page_size: usize) -> (CacheStore, Arc<FsBlobStore>) {
        let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs"), "http://h/files"));
        (CacheStore::new(blobs.clone(), page_size), blobs)
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = new_cache(&dir, 10);
        assert!(cache.lookup("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_prefers_artifact_url() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = new_cache(&dir, 10);
        let source = dir.path().join("Song.mp3");
        tokio::fs::write(&source, b"audio").await.unwrap();

        let url = cache
            .put_artifact("abc123", &source, CancellationToken::new())
            .await
            .unwrap();
        let mut item = JobItem::new("abc123");
        item.storage_url = Some(url.clone());
        cache
            .put_metadata("abc123", &item, CancellationToken::new())
            .await
            .unwrap();

        let hit = cache.lookup("abc123").await.unwrap().unwrap();
        assert_eq!(hit.url, "http://h/files/abc123/Song.mp3");
        assert_eq!(hit.sidecar.unwrap().storage_url, Some(url));
    }

    #[tokio::test]
    async fn test_new_title_replaces_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let (cache, blobs) = new_cache(&dir, 10);
        let mut item = JobItem::new("abc123");
        for title in ["Alpha", "Zed"] {
            let source = dir.path().join(format!("{}.mp3", title));
            tokio::fs::write(&source, title.as_bytes()).await.unwrap();
            let url = cache
                .put_artifact("abc123", &source, CancellationToken::new())
                .await
                .unwrap();
            item.storage_url = Some(url);
            cache
                .put_metadata("abc123", &item, CancellationToken::new())
                .await
                .unwrap();
        }

        let keys: Vec<_> = blobs
            .list("abc123/", None, 10)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["abc123/Zed.mp3", "abc123/index.json"]);

        let hit = cache.lookup("abc123").await.unwrap().unwrap();
        assert_eq!(hit.url, "http://h/files/abc123/Zed.mp3");
    }

    #[tokio::test]
    async fn test_lookup_follows_sidecar_url() {
        let dir = TempDir::new().unwrap();
        let (cache, blobs) = new_cache(&dir, 10);
        for key in ["abc123/Alpha.mp3", "abc123/Zed.mp3"] {
            blobs
                .put_bytes(key, b"audio".to_vec(), CancellationToken::new())
                .await
                .unwrap();
        }
        let mut item = JobItem::new("abc123");
        item.storage_url = Some("http://h/files/abc123/Zed.mp3".to_string());
        cache
            .put_metadata("abc123", &item, CancellationToken::new())
            .await
            .unwrap();

        let hit = cache.lookup("abc123").await.unwrap().unwrap();
        assert_eq!(hit.url, "http://h/files/abc123/Zed.mp3");
    }

    #[tokio::test]
    async fn test_lookup_sidecar_only_namespace_is_present() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = new_cache(&dir, 10);
        cache
            .put_metadata("abc123", &JobItem::new("abc123"), CancellationToken::new())
            .await
            .unwrap();

        let hit = cache.lookup("abc123").await.unwrap().unwrap();
        assert_eq!(hit.url, "http://h/files/abc123/index.json");
    }

    #[tokio::test]
    async fn test_lookup_does_not_match_prefix_of_other_id() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = new_cache(&dir, 10);
        cache
            .put_metadata("abc1234", &JobItem::new("abc1234"), CancellationToken::new())
            .await
            .unwrap();
        assert!(cache.lookup("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sidecar_drops_routing_fields() {
        let dir = TempDir::new().unwrap();
        let (cache, blobs) = new_cache(&dir, 10);
        let mut item = JobItem::new("abc123");
        item.invocation_id = Some("inv-1".to_string());
        item.client_session_id = Some("session-1".to_string());
        cache
            .put_metadata("abc123", &item, CancellationToken::new())
            .await
            .unwrap();

        let raw = blobs.get("abc123/index.json").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(json.get("invocationId").is_none());
        assert!(json.get("clientSessionId").is_none());
    }

    #[tokio::test]
    async fn test_list_all_pages_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let (cache, blobs) = new_cache(&dir, 2);
        for id in ["a", "b", "c"] {
            cache
                .put_metadata(id, &JobItem::new(id), CancellationToken::new())
                .await
                .unwrap();
        }
        blobs
            .put_bytes("d/index.json", b"not json".to_vec(), CancellationToken::new())
            .await
            .unwrap();

        let mut ids: Vec<_> = cache
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_id() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = new_cache(&dir, 10);
        assert!(matches!(
            cache.lookup("a/b").await,
            Err(StorageError::InvalidKey { .. })
        ));
    }
}
