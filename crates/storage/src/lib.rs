//! Remote artifact storage.
//!
//! [`ArtifactStore`] is the seam the workflow fetches bundles, manifests
//! and maven artifacts through, and uploads results to. Two backends:
//!
//! - [`S3Bucket`]: an S3 bucket via the AWS SDK.
//! - [`LocalStore`]: a directory laid out like the bucket, for offline
//!   runs and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub mod local;
pub mod s3;

pub use local::LocalStore;
pub use s3::S3Bucket;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested object (or prefix) does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The storage service or network failed.
    #[error("Storage transport error: {0}")]
    Transport(String),

    /// Reading or writing the local side failed.
    #[error("Local I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download one object into `local_dir`, keeping its file name.
    /// Returns the local path.
    async fn download_file(&self, key: &str, local_dir: &Path) -> Result<PathBuf, StorageError>;

    /// Download every object under `prefix` into `local_dir`, preserving
    /// paths relative to the prefix. Returns the local paths written.
    async fn download_folder(
        &self,
        prefix: &str,
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, StorageError>;

    /// Upload a local file to `key`.
    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<(), StorageError>;
}

/// Local target for `key` under `prefix`, or `None` for directory markers
/// (keys ending in `/`) and keys outside the prefix.
pub(crate) fn relative_target(prefix: &str, key: &str, local_dir: &Path) -> Option<PathBuf> {
    let relative = key.strip_prefix(prefix)?.trim_start_matches('/');
    if relative.is_empty() || key.ends_with('/') {
        return None;
    }
    if relative.split('/').any(|part| part == "..") {
        tracing::warn!(key, "Skipping object key that escapes the target directory");
        return None;
    }
    Some(local_dir.join(relative))
}
