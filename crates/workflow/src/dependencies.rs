//! Common dependencies shared by every component's integration suite.
//!
//! They are checked out once per run under `<work>/dependencies/`,
//! optionally published to maven local with the build-tools script, and
//! the build's own maven artifacts can be mirrored locally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bundle_core::locations::BuildCoordinates;
use bundle_core::manifests::BuildManifest;
use bundle_core::scripting::{ScriptError, ScriptExecutor, ScriptInput};
use bundle_core::COMMON_DEPENDENCIES;
use bundle_storage::ArtifactStore;

use crate::config::RepoRef;
use crate::git::{SourceControl, WorkingCopy};
use crate::WorkflowError;

pub const DEPENDENCIES_DIR: &str = "dependencies";
pub const BUILD_TOOLS_DIR: &str = "opensearch-build";
/// Publishing script, relative to the build-tools checkout.
pub const PUBLISH_SCRIPT: &str = "tools/standard-test/integtest_dependencies_opensearch.sh";

/// Checkouts produced by [`DependencyProvider::pull_common`].
#[derive(Debug, Clone)]
pub struct CommonDependencies {
    pub build_tools: WorkingCopy,
    /// `(component name, checkout)` in build-manifest order.
    pub components: Vec<(String, WorkingCopy)>,
}

pub struct DependencyProvider<'a> {
    git: &'a dyn SourceControl,
    root: PathBuf,
}

impl<'a> DependencyProvider<'a> {
    pub fn new(git: &'a dyn SourceControl, work_dir: &Path) -> Self {
        Self {
            git,
            root: work_dir.join(DEPENDENCIES_DIR),
        }
    }

    /// Check out the build tools and every common dependency named in the
    /// build manifest, at the revisions that were built.
    pub async fn pull_common(
        &self,
        build_tools: &RepoRef,
        build: &BuildManifest,
    ) -> Result<CommonDependencies, WorkflowError> {
        tracing::info!("Pulling common dependencies for integration tests");
        let tools = self
            .git
            .checkout(&build_tools.url, &build_tools.git_ref, &self.root.join(BUILD_TOOLS_DIR))
            .await?;

        let mut components = Vec::new();
        for component in build
            .components
            .iter()
            .filter(|c| COMMON_DEPENDENCIES.contains(&c.name.as_str()))
        {
            tracing::info!(component = %component.name, commit = %component.commit_id, "Pulling dependency");
            let copy = self
                .git
                .checkout(&component.repository, &component.commit_id, &self.root.join(&component.name))
                .await?;
            components.push((component.name.clone(), copy));
        }
        Ok(CommonDependencies {
            build_tools: tools,
            components,
        })
    }

    /// Run the publishing script for each common dependency, from inside
    /// that dependency's checkout. A missing script is logged and skipped.
    pub async fn sync_to_maven_local<E: ScriptExecutor>(
        &self,
        executor: &E,
        deps: &CommonDependencies,
        version: &str,
        timeout: Duration,
    ) -> Result<(), WorkflowError> {
        let script = deps.build_tools.dir().join(PUBLISH_SCRIPT);

        for (name, copy) in &deps.components {
            let input = ScriptInput::new(copy.dir(), timeout)
                .arg(name.to_lowercase())
                .arg(version);
            tracing::info!(dependency = %name, version, "Publishing dependency to maven local");

            match executor.execute(&script, input).await {
                Ok(output) if output.success() => {}
                Ok(output) => {
                    return Err(WorkflowError::Dependency(format!(
                        "publishing {name} exited with {}: {}",
                        output.exit_code,
                        output.stderr.trim()
                    )))
                }
                Err(ScriptError::NotFound(path)) => {
                    tracing::warn!(script = %path, "Dependency publishing script not found, skipping");
                    return Ok(());
                }
                Err(e) => {
                    return Err(WorkflowError::Dependency(format!("publishing {name}: {e}")))
                }
            }
        }
        Ok(())
    }
}

/// Copy the build's published maven artifacts into `dest`.
pub async fn mirror_maven(
    store: &dyn ArtifactStore,
    coords: &BuildCoordinates,
    dest: &Path,
) -> Result<Vec<PathBuf>, WorkflowError> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| WorkflowError::io(dest, e))?;
    let prefix = coords.maven_prefix();
    tracing::info!(prefix = %prefix, dest = %dest.display(), "Mirroring maven artifacts");
    let files = store.download_folder(&prefix, dest).await?;
    tracing::info!(files = files.len(), "Maven artifacts mirrored");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use bundle_core::manifests::{BuildInfo, ComponentSource};
    use bundle_core::scripting::ShellExecutor;
    use bundle_storage::LocalStore;

    use super::*;
    use crate::test_support::FakeGit;

    fn source(name: &str) -> ComponentSource {
        ComponentSource {
            name: name.into(),
            repository: format!("https://github.com/opensearch-project/{name}.git"),
            git_ref: "main".into(),
            commit_id: format!("sha-{name}"),
            version: None,
            artifacts: BTreeMap::new(),
        }
    }

    fn build_manifest(names: &[&str]) -> BuildManifest {
        BuildManifest {
            schema_version: "1.0".into(),
            build: BuildInfo {
                name: "OpenSearch".into(),
                version: "1.1.0".into(),
                architecture: "x64".into(),
                id: 15,
            },
            components: names.iter().map(|n| source(n)).collect(),
        }
    }

    fn tools() -> RepoRef {
        RepoRef {
            url: "https://github.com/opensearch-project/opensearch-build.git".into(),
            git_ref: "main".into(),
        }
    }

    #[tokio::test]
    async fn pulls_tools_and_only_common_dependencies() {
        let work = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let provider = DependencyProvider::new(&git, work.path());

        let deps = provider
            .pull_common(&tools(), &build_manifest(&["OpenSearch", "sql", "common-utils"]))
            .await
            .unwrap();

        let names: Vec<&str> = deps.components.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["OpenSearch", "common-utils"]);
        assert_eq!(
            git.checkouts(),
            vec![
                ("opensearch-build".to_string(), "main".to_string()),
                ("OpenSearch".to_string(), "sha-OpenSearch".to_string()),
                ("common-utils".to_string(), "sha-common-utils".to_string()),
            ]
        );
        assert_eq!(deps.build_tools.dir(), work.path().join("dependencies/opensearch-build"));
    }

    #[tokio::test]
    async fn publish_script_runs_per_dependency_in_its_checkout() {
        let work = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let provider = DependencyProvider::new(&git, work.path());
        let deps = provider
            .pull_common(&tools(), &build_manifest(&["OpenSearch", "common-utils"]))
            .await
            .unwrap();

        let script = deps.build_tools.dir().join(PUBLISH_SCRIPT);
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "#!/bin/bash\necho \"$1 $2\" > published.txt\n").unwrap();

        provider
            .sync_to_maven_local(&ShellExecutor, &deps, "1.1.0", Duration::from_secs(10))
            .await
            .unwrap();

        for (name, copy) in &deps.components {
            let published = std::fs::read_to_string(copy.dir().join("published.txt")).unwrap();
            assert_eq!(published.trim(), format!("{} 1.1.0", name.to_lowercase()));
        }
    }

    #[tokio::test]
    async fn failing_publish_is_dependency_error() {
        let work = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let provider = DependencyProvider::new(&git, work.path());
        let deps = provider
            .pull_common(&tools(), &build_manifest(&["OpenSearch"]))
            .await
            .unwrap();
        let script = deps.build_tools.dir().join(PUBLISH_SCRIPT);
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "#!/bin/bash\nexit 1\n").unwrap();

        let result = provider
            .sync_to_maven_local(&ShellExecutor, &deps, "1.1.0", Duration::from_secs(10))
            .await;
        assert_matches!(result, Err(WorkflowError::Dependency(msg)) if msg.contains("OpenSearch"));
    }

    #[tokio::test]
    async fn missing_publish_script_is_skipped() {
        let work = tempfile::tempdir().unwrap();
        let git = FakeGit::default();
        let provider = DependencyProvider::new(&git, work.path());
        let deps = provider
            .pull_common(&tools(), &build_manifest(&["OpenSearch"]))
            .await
            .unwrap();

        provider
            .sync_to_maven_local(&ShellExecutor, &deps, "1.1.0", Duration::from_secs(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mirror_maven_copies_build_folder() {
        let root = tempfile::tempdir().unwrap();
        let jar = root.path().join("builds/1.1.0/15/x64/maven/org/opensearch/a.jar");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, "jar").unwrap();
        let dest = tempfile::tempdir().unwrap();

        let files = mirror_maven(
            &LocalStore::new(root.path()),
            &BuildCoordinates::new("1.1.0", 15, "x64"),
            dest.path(),
        )
        .await
        .unwrap();

        assert_eq!(files, vec![dest.path().join("org/opensearch/a.jar")]);
    }
}
