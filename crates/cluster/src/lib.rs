//! Test cluster lifecycle.
//!
//! A [`TestCluster`] is downloaded from a bundle artifact, started,
//! health-polled until green, and torn down exactly once:
//!
//! ```text
//! Uninitialized --download()--> Downloaded --create()--> Running --destroy()--> Terminated
//! ```
//!
//! [`LocalTestCluster`] runs the bundle as a child process on this host.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bundle_core::manifests::BuildDescriptor;
use bundle_storage::ArtifactStore;

pub mod config;
pub mod error;
pub mod health;
pub mod local;
pub mod poll;
pub mod process;
pub mod unpack;

pub use config::{ClusterConfig, HealthPollConfig};
pub use error::ClusterError;
pub use local::LocalTestCluster;
pub use process::ShutdownReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Uninitialized,
    Downloaded,
    Running,
    Terminated,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Downloaded => "downloaded",
            Self::Running => "running",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Where test suites reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
    pub security_enabled: bool,
}

impl ClusterEndpoint {
    pub fn scheme(&self) -> &'static str {
        if self.security_enabled {
            "https"
        } else {
            "http"
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, path)
    }
}

#[async_trait]
pub trait TestCluster: Send {
    /// Fetch and unpack the bundle. Only valid when uninitialized.
    async fn download(&mut self) -> Result<(), ClusterError>;

    /// Start the cluster and wait for it to turn green. Only valid once
    /// downloaded. On a failed health poll the process is left running and
    /// the caller must still call [`TestCluster::destroy`].
    async fn create(&mut self) -> Result<(), ClusterError>;

    /// Stop the cluster process. A no-op returning `Ok(None)` when no
    /// process was ever started or it was already stopped.
    async fn destroy(&mut self) -> Result<Option<ShutdownReport>, ClusterError>;

    fn state(&self) -> ClusterState;

    fn endpoint(&self) -> ClusterEndpoint;

    /// Files holding the cluster's captured output.
    fn log_files(&self) -> Vec<PathBuf>;

    fn port(&self) -> u16 {
        self.endpoint().port
    }

    fn url(&self, path: &str) -> String {
        self.endpoint().url(path)
    }
}

/// Which [`TestCluster`] implementation a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterBackend {
    #[default]
    Local,
}

impl std::str::FromStr for ClusterBackend {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            other => Err(ClusterError::Config(format!(
                "unknown cluster backend '{other}'"
            ))),
        }
    }
}

/// Construct the cluster for one run.
pub fn build_cluster(
    backend: ClusterBackend,
    config: ClusterConfig,
    build: BuildDescriptor,
    store: Arc<dyn ArtifactStore>,
    work_dir: impl Into<PathBuf>,
) -> Box<dyn TestCluster> {
    match backend {
        ClusterBackend::Local => Box::new(LocalTestCluster::new(config, build, store, work_dir)),
    }
}
