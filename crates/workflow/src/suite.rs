//! Runs one component's integration tests against a live cluster.
//!
//! The component is checked out at the commit recorded in the bundle
//! manifest, its `integtest.sh` is located through the [`ScriptFinder`],
//! and the script is invoked as
//! `integtest.sh -b <host> -p <port> -s <true|false>` from the checkout.
//! Every failure is turned into a [`TestOutcome`]; nothing here aborts the
//! run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bundle_cluster::ClusterEndpoint;
use bundle_core::manifests::{ComponentDescriptor, SuiteConfig};
use bundle_core::outcome::TestOutcome;
use bundle_core::scripting::{ScriptError, ScriptExecutor, ScriptFinder, ScriptInput};

use crate::git::SourceControl;

pub struct IntegTestSuite<E> {
    git: Arc<dyn SourceControl>,
    finder: ScriptFinder,
    executor: E,
    work_dir: PathBuf,
    timeout: Duration,
}

impl<E: ScriptExecutor> IntegTestSuite<E> {
    pub fn new(
        git: Arc<dyn SourceControl>,
        finder: ScriptFinder,
        executor: E,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            git,
            finder,
            executor,
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub async fn execute(
        &self,
        component: &ComponentDescriptor,
        config: &SuiteConfig,
        endpoint: &ClusterEndpoint,
    ) -> TestOutcome {
        let name = component.name.as_str();

        if !config.accepts_security_mode(endpoint.security_enabled) {
            tracing::info!(
                component = name,
                test_configs = ?config.test_configs,
                security = endpoint.security_enabled,
                "Skipping integ tests, security mode not supported",
            );
            return TestOutcome::skipped(
                name,
                format!(
                    "does not support security {}",
                    if endpoint.security_enabled { "enabled" } else { "disabled" }
                ),
            );
        }
        if !config.build_dependencies.is_empty() {
            tracing::info!(component = name, dependencies = ?config.build_dependencies, "Build dependencies");
        }

        let checkout_dir = self.work_dir.join(name);
        let repo = match self
            .git
            .checkout(&component.repository, &component.commit_id, &checkout_dir)
            .await
        {
            Ok(repo) => repo,
            Err(e) => {
                tracing::error!(component = name, error = %e, "Checkout failed");
                return TestOutcome::failed(name, None, format!("checkout failed: {e}"));
            }
        };

        let Some(script) = self.finder.find_integ_test_script(name, repo.dir()) else {
            tracing::info!(component = name, "No integtest.sh found, skipping integ tests");
            return TestOutcome::skipped(name, "no integtest.sh found");
        };

        let input = ScriptInput::new(repo.dir(), self.timeout)
            .arg("-b")
            .arg(endpoint.host.clone())
            .arg("-p")
            .arg(endpoint.port.to_string())
            .arg("-s")
            .arg(endpoint.security_enabled.to_string());

        tracing::info!(component = name, script = %script.display(), "Running integ tests");
        match self.executor.execute(&script, input).await {
            Ok(output) if output.success() => {
                tracing::info!(component = name, duration_ms = output.duration_ms, "Integ tests passed");
                TestOutcome::passed(name)
            }
            Ok(output) => {
                tracing::warn!(
                    component = name,
                    exit_code = output.exit_code,
                    stderr = %tail(&output.stderr),
                    "Integ tests failed",
                );
                TestOutcome::failed(
                    name,
                    Some(output.exit_code),
                    format!("exit code {}", output.exit_code),
                )
            }
            Err(ScriptError::Timeout { elapsed_ms }) => {
                tracing::warn!(component = name, elapsed_ms, "Integ tests timed out");
                TestOutcome::failed(name, None, format!("timed out after {elapsed_ms}ms"))
            }
            Err(e) => {
                tracing::error!(component = name, error = %e, "Integ test script could not run");
                TestOutcome::failed(name, None, e.to_string())
            }
        }
    }
}

/// Last few lines of script output, for log lines.
fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(20);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bundle_core::outcome::TestStatus;
    use bundle_core::scripting::ShellExecutor;

    use super::*;
    use crate::test_support::{component, FakeGit};

    struct Fixture {
        work: tempfile::TempDir,
        scripts: tempfile::TempDir,
        git: Arc<FakeGit>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                work: tempfile::tempdir().unwrap(),
                scripts: tempfile::tempdir().unwrap(),
                git: Arc::new(FakeGit::default()),
            }
        }

        fn suite(&self, timeout: Duration) -> IntegTestSuite<ShellExecutor> {
            IntegTestSuite::new(
                self.git.clone(),
                ScriptFinder::new(self.scripts.path()),
                ShellExecutor,
                self.work.path(),
                timeout,
            )
        }
    }

    fn endpoint(security_enabled: bool) -> ClusterEndpoint {
        ClusterEndpoint {
            host: "localhost".into(),
            port: 9200,
            security_enabled,
        }
    }

    #[tokio::test]
    async fn passing_script_receives_cluster_arguments() {
        let f = Fixture::new();
        f.git.script("sql", "echo \"$@\" > args.txt\nexit 0\n");

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(false))
            .await;

        assert_eq!(outcome.status, TestStatus::Passed);
        let args = std::fs::read_to_string(f.work.path().join("sql/args.txt")).unwrap();
        assert_eq!(args.trim(), "-b localhost -p 9200 -s false");
        assert_eq!(f.git.checkouts(), vec![("sql".to_string(), "sha-sql".to_string())]);
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed_with_code() {
        let f = Fixture::new();
        f.git.script("sql", "exit 2\n");

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.exit_code, Some(2));
    }

    #[tokio::test]
    async fn missing_script_is_skipped() {
        let f = Fixture::new();

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("no integtest.sh found"));
    }

    #[tokio::test]
    async fn default_script_is_used_when_checkout_has_none() {
        let f = Fixture::new();
        let default = f.scripts.path().join("default/integtest.sh");
        std::fs::create_dir_all(default.parent().unwrap()).unwrap();
        std::fs::write(&default, "#!/bin/bash\npwd > ran-in.txt\n").unwrap();

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Passed);
        let ran_in = std::fs::read_to_string(f.work.path().join("sql/ran-in.txt")).unwrap();
        assert_eq!(Path::new(ran_in.trim()), f.work.path().join("sql").canonicalize().unwrap());
    }

    #[tokio::test]
    async fn timeout_is_failed() {
        let f = Fixture::new();
        f.git.script("sql", "sleep 30\n");

        let outcome = f
            .suite(Duration::from_millis(200))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert!(outcome.reason.unwrap().starts_with("timed out"));
    }

    #[tokio::test]
    async fn checkout_failure_is_failed() {
        let f = Fixture::new();
        f.git.fail_checkout("sql");

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &SuiteConfig::default(), &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert!(outcome.reason.unwrap().starts_with("checkout failed"));
    }

    #[tokio::test]
    async fn unsupported_security_mode_is_skipped_without_checkout() {
        let f = Fixture::new();
        f.git.script("sql", "exit 0\n");
        let config = SuiteConfig {
            build_dependencies: vec![],
            test_configs: vec!["without-security".into()],
        };

        let outcome = f
            .suite(Duration::from_secs(10))
            .execute(&component("sql"), &config, &endpoint(true))
            .await;

        assert_eq!(outcome.status, TestStatus::Skipped);
        assert!(f.git.checkouts().is_empty());
    }
}
