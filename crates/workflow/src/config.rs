//! Command-line and environment configuration for a run.

use std::path::PathBuf;
use std::time::Duration;

use bundle_cluster::{ClusterBackend, ClusterConfig};
use bundle_core::locations::BuildCoordinates;
use clap::{Parser, ValueEnum};

use crate::WorkflowError;

pub const DEFAULT_BUILD_TOOLS_REPO: &str = "https://github.com/opensearch-project/opensearch-build.git";

#[derive(Debug, Parser)]
#[command(name = "bundle-integ-test")]
#[command(version, about = "Run component integration tests against a distribution bundle", long_about = None)]
pub struct Cli {
    /// S3 bucket holding bundles, builds and test results.
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// AWS region of the bucket (default: from the AWS config chain).
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Local directory laid out like the bucket, used instead of S3.
    #[arg(long, env = "ARTIFACT_ROOT", conflicts_with = "s3_bucket")]
    pub artifact_root: Option<PathBuf>,

    /// Distribution version to test.
    #[arg(long, env = "OPENSEARCH_VERSION")]
    pub opensearch_version: Option<String>,

    /// Build id of the artifact under test.
    #[arg(long, env = "BUILD_ID")]
    pub build_id: Option<u64>,

    /// Target architecture, e.g. x64 or arm64.
    #[arg(long, env = "ARCHITECTURE", default_value = "x64")]
    pub architecture: String,

    /// Local bundle manifest, instead of fetching it from storage.
    #[arg(long, requires = "build_manifest")]
    pub bundle_manifest: Option<PathBuf>,

    /// Local build manifest, instead of fetching it from storage.
    #[arg(long, requires = "bundle_manifest")]
    pub build_manifest: Option<PathBuf>,

    /// Test-support manifest.
    #[arg(long, default_value = "config/test_manifest.yml")]
    pub test_manifest: PathBuf,

    /// Root of the per-component and default test scripts.
    #[arg(long, env = "SCRIPTS_DIR", default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Run the cluster with the security plugin disabled.
    #[arg(long)]
    pub without_security: bool,

    /// Repository holding the dependency publishing tools.
    #[arg(long, default_value = DEFAULT_BUILD_TOOLS_REPO)]
    pub build_tools_repo: String,

    #[arg(long, default_value = "main")]
    pub build_tools_ref: String,

    /// Publish common dependencies to maven local before testing.
    #[arg(long)]
    pub sync_maven_local: bool,

    /// Mirror the build's maven artifacts into this directory.
    #[arg(long)]
    pub maven_dir: Option<PathBuf>,

    /// Where test-results.json and cluster logs are written.
    #[arg(long, default_value = "test-results")]
    pub output_dir: PathBuf,

    /// Upload results to storage after the run.
    #[arg(long)]
    pub upload_results: bool,

    /// Parent of the temporary work directory (default: system temp).
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Do not delete the working temporary directory.
    #[arg(long)]
    pub keep: bool,

    /// Timeout for each component's test script, in seconds.
    #[arg(long, env = "TEST_TIMEOUT_SECS", default_value_t = 7200)]
    pub test_timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = BackendArg::Local)]
    pub cluster_backend: BackendArg,

    /// Show more verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Local,
}

impl From<BackendArg> for ClusterBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Local => Self::Local,
        }
    }
}

/// Where artifacts are read from and results written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3 {
        bucket: String,
        region: Option<String>,
    },
    Local(PathBuf),
}

/// Where the bundle and build manifests come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Local { bundle: PathBuf, build: PathBuf },
    Remote(BuildCoordinates),
}

/// A repository at a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub url: String,
    pub git_ref: String,
}

/// Everything the orchestrator needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub scripts_dir: PathBuf,
    pub build_tools: RepoRef,
    pub sync_maven_local: bool,
    pub maven_dir: Option<PathBuf>,
    pub test_timeout: Duration,
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub storage: StorageConfig,
    pub manifests: ManifestSource,
    pub test_manifest: PathBuf,
    pub options: RunOptions,
    pub output_dir: PathBuf,
    pub upload_results: bool,
    pub work_parent: Option<PathBuf>,
    pub keep: bool,
    pub cluster_backend: ClusterBackend,
    pub cluster: ClusterConfig,
}

impl Cli {
    /// Validate flags and combine them with the cluster settings.
    pub fn into_config(self, cluster: ClusterConfig) -> Result<WorkflowConfig, WorkflowError> {
        let storage = match (self.s3_bucket, self.artifact_root) {
            (Some(bucket), None) => StorageConfig::S3 {
                bucket,
                region: self.region,
            },
            (None, Some(root)) => StorageConfig::Local(root),
            (None, None) => {
                return Err(WorkflowError::Config(
                    "one of --s3-bucket or --artifact-root is required".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(WorkflowError::Config(
                    "--s3-bucket and --artifact-root are mutually exclusive".into(),
                ))
            }
        };

        let manifests = match (self.bundle_manifest, self.build_manifest) {
            (Some(bundle), Some(build)) => ManifestSource::Local { bundle, build },
            (None, None) => match (self.opensearch_version, self.build_id) {
                (Some(version), Some(build_id)) => ManifestSource::Remote(BuildCoordinates::new(
                    version,
                    build_id,
                    self.architecture,
                )),
                _ => {
                    return Err(WorkflowError::Config(
                        "--opensearch-version and --build-id are required unless both local manifests are given"
                            .into(),
                    ))
                }
            },
            _ => {
                return Err(WorkflowError::Config(
                    "--bundle-manifest and --build-manifest must be given together".into(),
                ))
            }
        };

        if self.test_timeout_secs == 0 {
            return Err(WorkflowError::Config("--test-timeout-secs must be positive".into()));
        }

        Ok(WorkflowConfig {
            storage,
            manifests,
            test_manifest: self.test_manifest,
            options: RunOptions {
                scripts_dir: self.scripts_dir,
                build_tools: RepoRef {
                    url: self.build_tools_repo,
                    git_ref: self.build_tools_ref,
                },
                sync_maven_local: self.sync_maven_local,
                maven_dir: self.maven_dir,
                test_timeout: Duration::from_secs(self.test_timeout_secs),
            },
            output_dir: self.output_dir,
            upload_results: self.upload_results,
            work_parent: self.work_dir,
            keep: self.keep,
            cluster_backend: self.cluster_backend.into(),
            cluster: cluster.with_security(!self.without_security),
        })
    }
}
