/// Errors raised while loading or validating a manifest.
///
/// Every variant is fatal for a run: manifests are loaded before any
/// cluster is started, so there is never partial state to clean up.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}
