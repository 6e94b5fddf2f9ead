use std::path::Path;

use bundle_storage::StorageError;

use crate::ClusterState;

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The bundle artifact could not be fetched from storage.
    #[error("Failed to fetch bundle: {0}")]
    Fetch(#[from] StorageError),

    /// The archive is corrupt or did not contain the expected install dir.
    #[error("Failed to unpack bundle: {0}")]
    Unpack(String),

    /// The process started but never reported a healthy cluster.
    #[error("Cluster creation failed: {0}")]
    Creation(String),

    /// An operation was called out of lifecycle order.
    #[error("Invalid cluster state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ClusterState,
        actual: ClusterState,
    },

    /// The cluster process survived SIGKILL. Fatal.
    #[error("Cluster process {pid} is still running after SIGKILL")]
    ProcessLeak { pid: u32 },

    #[error("Invalid cluster configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClusterError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
