//! Persists a run's results: the JSON report plus the cluster's logs.

use std::path::{Path, PathBuf};

use bundle_core::outcome::RunReport;
use bundle_storage::ArtifactStore;

use crate::WorkflowError;

pub const RESULTS_FILE: &str = "test-results.json";
pub const CLUSTER_LOGS_DIR: &str = "cluster-logs";

pub struct ResultRecorder {
    output_dir: PathBuf,
}

impl ResultRecorder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the report and copy `cluster_logs` under the output dir.
    /// Returns every file written.
    pub async fn record(
        &self,
        report: &RunReport,
        cluster_logs: &[PathBuf],
    ) -> Result<Vec<PathBuf>, WorkflowError> {
        let logs_dir = self.output_dir.join(CLUSTER_LOGS_DIR);
        tokio::fs::create_dir_all(&logs_dir)
            .await
            .map_err(|e| WorkflowError::io(&logs_dir, e))?;

        let results = self.output_dir.join(RESULTS_FILE);
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&results, json)
            .await
            .map_err(|e| WorkflowError::io(&results, e))?;
        let mut written = vec![results];

        for log in cluster_logs {
            let Some(name) = log.file_name() else { continue };
            let target = logs_dir.join(name);
            match tokio::fs::copy(log, &target).await {
                Ok(_) => written.push(target),
                // A missing log must not hide the test results.
                Err(e) => tracing::warn!(log = %log.display(), error = %e, "Could not copy cluster log"),
            }
        }

        tracing::info!(output_dir = %self.output_dir.display(), files = written.len(), "Recorded test results");
        Ok(written)
    }

    /// Upload recorded files under `prefix`, keeping their paths relative
    /// to the output dir.
    pub async fn upload(
        &self,
        store: &dyn ArtifactStore,
        prefix: &str,
        files: &[PathBuf],
    ) -> Result<(), WorkflowError> {
        for file in files {
            let relative = file.strip_prefix(&self.output_dir).unwrap_or(file);
            let key = format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                relative.to_string_lossy().trim_start_matches('/')
            );
            store.upload_file(file, &key).await?;
        }
        tracing::info!(prefix, files = files.len(), "Uploaded test results");
        Ok(())
    }
}
