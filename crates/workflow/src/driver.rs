//! The orchestration driver.
//!
//! One pass, strictly in order:
//!
//! 1. load the bundle, build and test-support manifests;
//! 2. select bundle components that declare integration tests;
//! 3. pull common dependencies once;
//! 4. inside a guarded scope, download and create the cluster and run each
//!    selected suite in bundle order;
//! 5. destroy the cluster on every exit path, panics included;
//! 6. aggregate outcomes into a [`RunReport`];
//! 7. record the report and cluster logs, also when the run aborted.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bundle_cluster::{build_cluster, TestCluster};
use bundle_core::locations::BuildCoordinates;
use bundle_core::manifests::{
    BuildManifest, BundleManifest, ComponentDescriptor, Manifest, SuiteConfig, TestManifest,
};
use bundle_core::outcome::{RunReport, TestOutcome};
use bundle_core::scripting::{ScriptFinder, ShellExecutor};
use bundle_storage::{ArtifactStore, LocalStore, S3Bucket};
use futures::FutureExt;

use crate::config::{ManifestSource, RunOptions, StorageConfig, WorkflowConfig};
use crate::dependencies::{mirror_maven, DependencyProvider};
use crate::git::{GitCli, SourceControl};
use crate::recorder::ResultRecorder;
use crate::suite::IntegTestSuite;
use crate::WorkflowError;

/// The three manifests a run works from.
#[derive(Debug, Clone)]
pub struct Manifests {
    pub bundle: BundleManifest,
    pub build: BuildManifest,
    pub test: TestManifest,
}

impl Manifests {
    /// Load from local files, or fetch the bundle and build manifests from
    /// storage into `work_dir/manifests/`.
    pub async fn load(
        source: &ManifestSource,
        test_manifest: &Path,
        store: &dyn ArtifactStore,
        work_dir: &Path,
    ) -> Result<Self, WorkflowError> {
        let (bundle_path, build_path) = match source {
            ManifestSource::Local { bundle, build } => (bundle.clone(), build.clone()),
            ManifestSource::Remote(coords) => {
                let bundle = fetch(store, &coords.bundle_manifest_key(), &work_dir.join("manifests/bundle")).await?;
                let build = fetch(store, &coords.build_manifest_key(), &work_dir.join("manifests/build")).await?;
                (bundle, build)
            }
        };

        tracing::info!(path = %bundle_path.display(), "Reading bundle manifest");
        let bundle = BundleManifest::from_path(&bundle_path)?;
        tracing::info!(path = %build_path.display(), "Reading build manifest");
        let build = BuildManifest::from_path(&build_path)?;
        tracing::info!(path = %test_manifest.display(), "Reading test manifest");
        let test = TestManifest::from_path(test_manifest)?;

        Ok(Self {
            bundle,
            build,
            test,
        })
    }

    pub fn coordinates(&self) -> BuildCoordinates {
        let build = &self.bundle.build;
        BuildCoordinates::new(&build.version, build.id, &build.architecture)
    }
}

async fn fetch(store: &dyn ArtifactStore, key: &str, dir: &Path) -> Result<PathBuf, WorkflowError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| WorkflowError::io(dir, e))?;
    Ok(store.download_file(key, dir).await?)
}

/// Bundle components split into those with an integration suite and
/// skip outcomes for the rest.
#[derive(Debug)]
pub struct Selection<'m> {
    pub selected: Vec<(&'m ComponentDescriptor, &'m SuiteConfig)>,
    pub skipped: Vec<TestOutcome>,
}

/// Bundle components whose test-support entry declares `integ-test`, in
/// bundle order. Components missing from the test manifest are untested.
pub fn select_components<'m>(bundle: &'m BundleManifest, test: &'m TestManifest) -> Selection<'m> {
    let mut selection = Selection {
        selected: Vec::new(),
        skipped: Vec::new(),
    };
    for component in &bundle.components {
        match test.integ_test(&component.name) {
            Some(config) => selection.selected.push((component, config)),
            None => {
                tracing::info!(
                    component = %component.name,
                    "Skipping tests for component, integ tests not supported",
                );
                selection.skipped.push(TestOutcome::skipped(
                    &component.name,
                    "integ tests not supported",
                ));
            }
        }
    }
    selection
}

/// A run that got as far as it could. `report` holds every outcome
/// recorded before `error` cut the run short, if one did.
#[derive(Debug)]
pub struct FinishedRun {
    pub report: RunReport,
    pub error: Option<WorkflowError>,
}

impl FinishedRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.report.is_success()
    }

    pub fn into_result(self) -> Result<RunReport, WorkflowError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.report),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn ArtifactStore>,
    git: Arc<dyn SourceControl>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ArtifactStore>, git: Arc<dyn SourceControl>, options: RunOptions) -> Self {
        Self {
            store,
            git,
            options,
        }
    }

    /// Run every selected suite against `cluster`. The cluster is destroyed
    /// before this returns or unwinds. A fatal error still yields the
    /// outcomes recorded up to that point.
    pub async fn run(
        &self,
        manifests: &Manifests,
        cluster: &mut dyn TestCluster,
        work_dir: &Path,
    ) -> FinishedRun {
        let run_id = uuid::Uuid::now_v7().to_string();
        let mut report = RunReport::start(run_id, &manifests.bundle.build);
        tracing::info!(
            run_id = %report.run_id,
            distribution = %report.distribution,
            version = %report.version,
            build_id = report.build_id,
            "Starting integration test run",
        );

        let selection = select_components(&manifests.bundle, &manifests.test);
        for outcome in selection.skipped {
            report.record(outcome);
        }

        let error = match self.prepare_dependencies(manifests, work_dir).await {
            Err(e) => Some(e),
            Ok(()) => self
                .run_guarded(cluster, work_dir, &selection.selected, &mut report)
                .await
                .err(),
        };

        report.finish();
        match &error {
            None => tracing::info!(
                success = report.is_success(),
                outcomes = report.outcomes.len(),
                "Integration test run finished",
            ),
            Some(e) => tracing::error!(
                error = %e,
                outcomes = report.outcomes.len(),
                "Integration test run aborted",
            ),
        }
        FinishedRun { report, error }
    }

    /// Bring the cluster up and test against it, then tear it down on every
    /// exit path. A teardown error wins over the run error.
    async fn run_guarded(
        &self,
        cluster: &mut dyn TestCluster,
        work_dir: &Path,
        selected: &[(&ComponentDescriptor, &SuiteConfig)],
        report: &mut RunReport,
    ) -> Result<(), WorkflowError> {
        let suite = IntegTestSuite::new(
            Arc::clone(&self.git),
            ScriptFinder::new(&self.options.scripts_dir),
            ShellExecutor,
            work_dir,
            self.options.test_timeout,
        );

        let guarded = AssertUnwindSafe(test_against_cluster(&mut *cluster, &suite, selected, report))
            .catch_unwind()
            .await;

        let teardown = cluster.destroy().await;

        let result = match guarded {
            Err(panic) => {
                if let Err(e) = teardown {
                    tracing::error!(error = %e, "Cluster teardown failed while unwinding");
                }
                std::panic::resume_unwind(panic);
            }
            Ok(result) => result,
        };

        match (result, teardown) {
            (Ok(()), Ok(_)) => Ok(()),
            (Ok(()), Err(teardown_err)) => Err(teardown_err.into()),
            (Err(run_err), Ok(_)) => Err(run_err),
            (Err(run_err), Err(teardown_err)) => {
                tracing::error!(error = %run_err, "Run failed before teardown");
                Err(teardown_err.into())
            }
        }
    }

    async fn prepare_dependencies(&self, manifests: &Manifests, work_dir: &Path) -> Result<(), WorkflowError> {
        let provider = DependencyProvider::new(self.git.as_ref(), work_dir);
        let deps = provider
            .pull_common(&self.options.build_tools, &manifests.build)
            .await?;

        if self.options.sync_maven_local {
            provider
                .sync_to_maven_local(
                    &ShellExecutor,
                    &deps,
                    &manifests.build.build.version,
                    self.options.test_timeout,
                )
                .await?;
        }
        if let Some(maven_dir) = &self.options.maven_dir {
            mirror_maven(self.store.as_ref(), &manifests.coordinates(), maven_dir).await?;
        }
        Ok(())
    }
}

/// The guarded part of a run: bring the cluster up and test against it.
async fn test_against_cluster(
    cluster: &mut dyn TestCluster,
    suite: &IntegTestSuite<ShellExecutor>,
    selected: &[(&ComponentDescriptor, &SuiteConfig)],
    report: &mut RunReport,
) -> Result<(), WorkflowError> {
    cluster.download().await?;
    cluster.create().await?;

    let endpoint = cluster.endpoint();
    for (component, config) in selected {
        tracing::info!(component = %component.name, "Running integ tests for component");
        let outcome = suite.execute(component, config, &endpoint).await;
        report.record(outcome);
    }
    Ok(())
}

/// Build the collaborators from `config`, run, and record the results.
///
/// Errors returned here happen before any cluster exists. Once the run has
/// started its report and the cluster logs are recorded even when it aborts;
/// the abort is carried in [`FinishedRun::error`].
pub async fn run_workflow(config: &WorkflowConfig) -> Result<FinishedRun, WorkflowError> {
    let store: Arc<dyn ArtifactStore> = match &config.storage {
        StorageConfig::S3 { bucket, region } => Arc::new(S3Bucket::new(bucket.clone(), region.clone()).await),
        StorageConfig::Local(root) => Arc::new(LocalStore::new(root)),
    };
    run_with(config, store, Arc::new(GitCli::default())).await
}

async fn run_with(
    config: &WorkflowConfig,
    store: Arc<dyn ArtifactStore>,
    git: Arc<dyn SourceControl>,
) -> Result<FinishedRun, WorkflowError> {
    let mut builder = tempfile::Builder::new();
    builder
        .prefix("bundle-integ-test-")
        .disable_cleanup(config.keep);
    let work = match &config.work_parent {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    }
    .map_err(|e| WorkflowError::io(config.work_parent.as_deref().unwrap_or(Path::new("<tmp>")), e))?;
    let work_dir = work.path();
    tracing::info!(work_dir = %work_dir.display(), keep = config.keep, "Using work directory");

    let manifests = Manifests::load(&config.manifests, &config.test_manifest, store.as_ref(), work_dir).await?;

    let mut cluster = build_cluster(
        config.cluster_backend,
        config.cluster.clone(),
        manifests.bundle.build.clone(),
        Arc::clone(&store),
        work_dir,
    );
    let orchestrator = Orchestrator::new(Arc::clone(&store), git, config.options.clone());
    let finished = orchestrator.run(&manifests, cluster.as_mut(), work_dir).await;

    let recorded = record_results(config, &manifests, store.as_ref(), &finished.report, &cluster.log_files()).await;
    match (recorded, &finished.error) {
        (Ok(()), _) => {}
        (Err(e), None) => return Err(e),
        (Err(e), Some(_)) => tracing::error!(error = %e, "Failed to record results of aborted run"),
    }
    Ok(finished)
}

async fn record_results(
    config: &WorkflowConfig,
    manifests: &Manifests,
    store: &dyn ArtifactStore,
    report: &RunReport,
    cluster_logs: &[PathBuf],
) -> Result<(), WorkflowError> {
    let recorder = ResultRecorder::new(&config.output_dir);
    let files = recorder.record(report, cluster_logs).await?;
    if config.upload_results {
        let prefix = manifests.coordinates().integ_test_results_prefix();
        recorder.upload(store, &prefix, &files).await?;
    }
    Ok(())
}
