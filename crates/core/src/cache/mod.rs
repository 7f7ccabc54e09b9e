//! Artifact cache on top of pluggable blob storage.

mod error;
mod fs;
mod store;
mod traits;

pub use error::StorageError;
pub use fs::FsBlobStore;
pub use store::{CacheStore, CachedArtifact, SIDECAR_NAME};
pub use traits::{BlobEntry, BlobPage, BlobStore};
