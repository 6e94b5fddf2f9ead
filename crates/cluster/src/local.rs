//! A test cluster running as a child process on this host.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bundle_core::locations::object_key_from_location;
use bundle_core::manifests::BuildDescriptor;
use bundle_storage::ArtifactStore;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::health::HealthClient;
use crate::poll::{poll_until_ready, Readiness};
use crate::process::{shut_down, ChildProcess, ClusterProcess, ShutdownReport};
use crate::{ClusterConfig, ClusterEndpoint, ClusterError, ClusterState, TestCluster};

pub const WORK_DIR_NAME: &str = "local-test-cluster";
pub const STDOUT_FILE: &str = "stdout.txt";
pub const STDERR_FILE: &str = "stderr.txt";

pub struct LocalTestCluster {
    config: ClusterConfig,
    build: BuildDescriptor,
    store: Arc<dyn ArtifactStore>,
    work_dir: PathBuf,
    install_dir: Option<PathBuf>,
    process: Option<Box<dyn ClusterProcess>>,
    stdout: Option<File>,
    stderr: Option<File>,
    state: ClusterState,
}

impl LocalTestCluster {
    /// Cluster for `build`, working under `<work_dir>/local-test-cluster`.
    pub fn new(
        config: ClusterConfig,
        build: BuildDescriptor,
        store: Arc<dyn ArtifactStore>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            build,
            store,
            work_dir: work_dir.into().join(WORK_DIR_NAME),
            install_dir: None,
            process: None,
            stdout: None,
            stderr: None,
            state: ClusterState::Uninitialized,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn install_dir(&self) -> Option<&Path> {
        self.install_dir.as_deref()
    }

    fn expect_state(&self, expected: ClusterState) -> Result<(), ClusterError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ClusterError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    async fn disable_security(&self, install_dir: &Path) -> Result<(), ClusterError> {
        let path = install_dir.join(&self.config.config_file);
        let existing = tokio::fs::read(&path)
            .await
            .map_err(|e| ClusterError::io(&path, e))?;

        let mut line = String::new();
        if existing.last().is_some_and(|b| *b != b'\n') {
            line.push('\n');
        }
        line.push_str(&self.config.security_disabled_line);
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ClusterError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ClusterError::io(&path, e))?;
        tracing::info!(config = %path.display(), "Disabled security plugin");
        Ok(())
    }

    fn open_capture(&self, name: &str) -> Result<File, ClusterError> {
        let path = self.work_dir.join(name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ClusterError::io(&path, e))
    }

    fn spawn(&mut self, install_dir: &Path) -> Result<u32, ClusterError> {
        let stdout = self.open_capture(STDOUT_FILE)?;
        let stderr = self.open_capture(STDERR_FILE)?;
        let script = install_dir.join(&self.config.start_script);

        let clone = |file: &File, name: &str| {
            file.try_clone()
                .map_err(|e| ClusterError::io(&self.work_dir.join(name), e))
        };
        let child = Command::new(&script)
            .current_dir(install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(clone(&stdout, STDOUT_FILE)?))
            .stderr(Stdio::from(clone(&stderr, STDERR_FILE)?))
            .process_group(0)
            .spawn()
            .map_err(|e| ClusterError::io(&script, e))?;
        let process = ChildProcess::new(child).map_err(|e| ClusterError::io(&script, e))?;
        let pid = process.pid();

        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self.process = Some(Box::new(process));
        Ok(pid)
    }

    async fn wait_for_service(&self) -> Result<(), ClusterError> {
        let endpoint = self.endpoint();
        let client = HealthClient::new(
            &endpoint,
            self.config.health.request_timeout,
            &self.config.username,
            &self.config.password,
        )
        .map_err(|e| ClusterError::Creation(format!("failed to build health client: {e}")))?;
        tracing::info!(url = client.url(), "Waiting for cluster to become available");

        let client = &client;
        poll_until_ready(&self.config.health, |_| async move {
            match client.cluster_health().await {
                Ok(health) if health.is_green() => Readiness::Ready,
                Ok(health) => Readiness::NotReady(format!("status {}", health.status)),
                Err(e) => Readiness::NotReady(e.to_string()),
            }
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TestCluster for LocalTestCluster {
    async fn download(&mut self) -> Result<(), ClusterError> {
        self.expect_state(ClusterState::Uninitialized)?;

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| ClusterError::io(&self.work_dir, e))?;
        tracing::info!(work_dir = %self.work_dir.display(), "Creating local test cluster");

        let key = object_key_from_location(&self.build.location);
        tracing::info!(location = %self.build.location, key, "Downloading bundle");
        let archive = self.store.download_file(key, &self.work_dir).await?;

        let digest = crate::unpack::sha256_file(&archive).await?;
        tracing::info!(archive = %archive.display(), sha256 = %digest, "Downloaded bundle");

        let install_dir =
            crate::unpack::extract_tar_gz(&archive, &self.work_dir, &self.build.install_dir_name())
                .await?;
        tracing::info!(install_dir = %install_dir.display(), "Unpacked bundle");

        self.install_dir = Some(install_dir);
        self.state = ClusterState::Downloaded;
        Ok(())
    }

    async fn create(&mut self) -> Result<(), ClusterError> {
        self.expect_state(ClusterState::Downloaded)?;
        let install_dir = self
            .install_dir
            .clone()
            .ok_or(ClusterError::InvalidState {
                expected: ClusterState::Downloaded,
                actual: self.state,
            })?;

        if !self.config.security_enabled {
            self.disable_security(&install_dir).await?;
        }

        let pid = self.spawn(&install_dir)?;
        self.state = ClusterState::Running;
        tracing::info!(pid, "Started cluster process");

        self.wait_for_service().await
    }

    async fn destroy(&mut self) -> Result<Option<ShutdownReport>, ClusterError> {
        let Some(mut process) = self.process.take() else {
            tracing::info!("Local test cluster is not started");
            return Ok(None);
        };

        let result = shut_down(process.as_mut(), self.config.shutdown_grace).await;

        self.stdout = None;
        self.stderr = None;
        self.state = ClusterState::Terminated;

        if let Ok(report) = &result {
            tracing::info!(
                pid = report.pid,
                exit_code = ?report.exit_code,
                forced = report.forced,
                "Cluster process stopped",
            );
        }
        result.map(Some)
    }

    fn state(&self) -> ClusterState {
        self.state
    }

    fn endpoint(&self) -> ClusterEndpoint {
        ClusterEndpoint {
            host: self.config.host.clone(),
            port: self.config.port,
            security_enabled: self.config.security_enabled,
        }
    }

    fn log_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = [STDOUT_FILE, STDERR_FILE]
            .iter()
            .map(|name| self.work_dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        if let Some(logs) = self.install_dir.as_ref().map(|dir| dir.join("logs")) {
            if let Ok(entries) = std::fs::read_dir(&logs) {
                let mut cluster_logs: Vec<PathBuf> = entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.is_file())
                    .collect();
                cluster_logs.sort();
                files.extend(cluster_logs);
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bundle_storage::LocalStore;

    use super::*;
    use crate::process::fake::{ExitsOn, FakeProcess};

    fn build() -> BuildDescriptor {
        BuildDescriptor {
            name: "OpenSearch".into(),
            version: "1.1.0".into(),
            architecture: "x64".into(),
            location: "bundles/1.1.0/15/x64/opensearch-1.1.0-linux-x64.tar.gz".into(),
            id: 15,
        }
    }

    fn cluster(work: &Path) -> LocalTestCluster {
        let store = Arc::new(LocalStore::new(work.join("store")));
        LocalTestCluster::new(ClusterConfig::default(), build(), store, work)
    }

    fn running_with(work: &Path, process: FakeProcess) -> LocalTestCluster {
        let mut cluster = cluster(work);
        cluster.process = Some(Box::new(process));
        cluster.state = ClusterState::Running;
        cluster
    }

    #[tokio::test]
    async fn destroy_without_process_is_noop() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = cluster(work.path());

        assert_matches!(cluster.destroy().await, Ok(None));
        assert_matches!(cluster.destroy().await, Ok(None));
        assert_eq!(cluster.state(), ClusterState::Uninitialized);
    }

    #[tokio::test]
    async fn create_before_download_is_invalid_state() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = cluster(work.path());

        assert_matches!(
            cluster.create().await,
            Err(ClusterError::InvalidState {
                expected: ClusterState::Downloaded,
                actual: ClusterState::Uninitialized,
            })
        );
        assert!(cluster.process.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_terminates_once_and_is_idempotent() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = running_with(work.path(), FakeProcess::new(ExitsOn::Term));

        let report = cluster.destroy().await.unwrap().unwrap();
        assert!(!report.forced);
        assert_eq!(cluster.state(), ClusterState::Terminated);

        assert_matches!(cluster.destroy().await, Ok(None));
        assert_matches!(
            cluster.create().await,
            Err(ClusterError::InvalidState {
                actual: ClusterState::Terminated,
                ..
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn leak_still_clears_handles() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = running_with(work.path(), FakeProcess::new(ExitsOn::Never));

        assert_matches!(cluster.destroy().await, Err(ClusterError::ProcessLeak { pid: 4242 }));
        assert!(cluster.process.is_none());
        assert!(cluster.stdout.is_none() && cluster.stderr.is_none());
        assert_eq!(cluster.state(), ClusterState::Terminated);
    }

    #[tokio::test]
    async fn missing_bundle_is_fetch_error() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = cluster(work.path());

        assert_matches!(cluster.download().await, Err(ClusterError::Fetch(e)) if e.is_not_found());
        assert_eq!(cluster.state(), ClusterState::Uninitialized);
    }

    #[test]
    fn url_reflects_security_mode() {
        let work = tempfile::tempdir().unwrap();
        let mut cluster = cluster(work.path());
        assert_eq!(cluster.url("/_cluster/health"), "https://localhost:9200/_cluster/health");

        cluster.config.security_enabled = false;
        assert_eq!(cluster.url(""), "http://localhost:9200");
        assert_eq!(cluster.port(), 9200);
    }
}
