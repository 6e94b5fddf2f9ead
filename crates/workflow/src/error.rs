use std::path::Path;

use bundle_cluster::ClusterError;
use bundle_core::error::ManifestError;
use bundle_storage::StorageError;

use crate::git::GitError;

/// Fatal errors of an orchestration run. Per-component test failures are
/// outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Git(#[from] GitError),

    /// Preparing a common dependency failed.
    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl WorkflowError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
