//! Directory-backed blob store.
//!
//! Keys map to paths under the root directory. Writes go to a `.partial`
//! staging file that is renamed into place, so readers never see a
//! half-written object.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::error::StorageError;
use super::traits::{BlobEntry, BlobPage, BlobStore};

const STAGING_SUFFIX: &str = ".partial";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// [`BlobStore`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    /// `public_base_url` is the URL under which `root` is served.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Unique per write, so concurrent uploads of one key never share a file.
    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}{}", Uuid::new_v4().simple(), STAGING_SUFFIX));
        PathBuf::from(name)
    }

    async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn copy_cancellable(
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, StorageError> {
        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, File::open(source).await?);
        let mut writer =
            BufWriter::with_capacity(COPY_BUFFER_SIZE, File::create(destination).await?);
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total_bytes = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            total_bytes += read as u64;
        }
        writer.flush().await?;
        Ok(total_bytes)
    }

    /// Every key under the root, sorted.
    async fn all_keys(&self) -> Result<Vec<BlobEntry>, StorageError> {
        let mut entries = Vec::new();
        if fs::metadata(&self.root).await.is_err() {
            return Ok(entries);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = fs::read_dir(&dir).await?;
            while let Some(entry) = reader.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.to_string_lossy().ends_with(STAGING_SUFFIX) {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                entries.push(BlobEntry { key, size_bytes });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_file(
        &self,
        key: &str,
        source: &Path,
        cancel: CancellationToken,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        let staging = Self::staging_path(&path);
        Self::ensure_parent(&path).await?;

        match Self::copy_cancellable(source, &staging, &cancel).await {
            Ok(bytes) => {
                fs::rename(&staging, &path).await?;
                debug!(key, bytes, "Stored blob");
                Ok(self.url_for(key))
            }
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                Err(e)
            }
        }
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
        let path = self.path_for(key)?;
        let staging = Self::staging_path(&path);
        Self::ensure_parent(&path).await?;

        fs::write(&staging, &bytes).await?;
        fs::rename(&staging, &path).await?;
        debug!(key, bytes = bytes.len(), "Stored blob");
        Ok(self.url_for(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        continuation: Option<String>,
        limit: usize,
    ) -> Result<BlobPage, StorageError> {
        let limit = limit.max(1);
        let mut matching = self
            .all_keys()
            .await?
            .into_iter()
            .filter(|e| e.key.starts_with(prefix))
            .filter(|e| match &continuation {
                Some(after) => e.key.as_str() > after.as_str(),
                None => true,
            })
            .peekable();

        let mut entries = Vec::with_capacity(limit);
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
        let encoded = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.public_base_url, encoded)
    }
}
