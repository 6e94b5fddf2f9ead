//! Version control: shallow checkouts of component repositories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bundle_core::scripting::subprocess::run_command;
use bundle_core::scripting::{ScriptError, ScriptInput, ScriptOutput};
use tokio::process::Command;

/// Default bound on a single git command.
const GIT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("`{command}` failed with exit code {exit_code}: {stderr}")]
    Command {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("`{command}` could not run: {source}")]
    Spawn {
        command: String,
        #[source]
        source: ScriptError,
    },

    #[error("Failed to prepare checkout directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fetches a repository at a revision into a directory.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn checkout(&self, url: &str, revision: &str, dir: &Path)
        -> Result<WorkingCopy, GitError>;
}

/// A checked-out repository. Commands run with the checkout as their
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    pub url: String,
    pub revision: String,
    dir: PathBuf,
}

impl WorkingCopy {
    pub fn new(url: impl Into<String>, revision: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            revision: revision.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `command` through `bash -c` inside the checkout.
    pub async fn execute(&self, command: &str) -> Result<ScriptOutput, GitError> {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        run_command(&mut cmd, ScriptInput::new(&self.dir, GIT_TIMEOUT))
            .await
            .map_err(|source| GitError::Spawn {
                command: command.to_string(),
                source,
            })
    }
}

/// [`SourceControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            timeout: GIT_TIMEOUT,
        }
    }
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<ScriptOutput, GitError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(cwd = %dir.display(), command = %command, "Running git");

        let mut input = ScriptInput::new(dir, self.timeout);
        for arg in args {
            input = input.arg(*arg);
        }
        let output = run_command(&mut Command::new("git"), input)
            .await
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.success() {
            return Err(GitError::Command {
                command,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn checkout(
        &self,
        url: &str,
        revision: &str,
        dir: &Path,
    ) -> Result<WorkingCopy, GitError> {
        tracing::info!(url, revision, dir = %dir.display(), "Checking out repository");
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| GitError::Io {
                path: dir.display().to_string(),
                source,
            })?;

        self.git(dir, &["init", "-q"]).await?;
        self.git(dir, &["remote", "add", "origin", url]).await?;
        self.git(dir, &["fetch", "--depth", "1", "origin", revision]).await?;
        self.git(dir, &["checkout", "-q", "FETCH_HEAD"]).await?;

        Ok(WorkingCopy::new(url, revision, dir))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn execute_runs_in_checkout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let copy = WorkingCopy::new("https://example.invalid/repo.git", "main", dir.path());

        let output = copy.execute("cat marker; echo err >&2; exit 3").await.unwrap();

        assert_eq!(output.stdout, "here");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn checkout_of_missing_remote_fails() {
        let work = tempfile::tempdir().unwrap();
        let remote = work.path().join("no-such-repo");
        let dir = work.path().join("checkout");

        let result = GitCli::new(Duration::from_secs(30))
            .checkout(remote.to_str().unwrap(), "main", &dir)
            .await;

        assert_matches!(result, Err(GitError::Command { command, .. }) if command.starts_with("git fetch"));
    }

    #[tokio::test]
    async fn checkout_fetches_revision_from_local_remote() {
        let work = tempfile::tempdir().unwrap();
        let remote = work.path().join("remote");
        std::fs::create_dir_all(&remote).unwrap();
        let setup = WorkingCopy::new("", "", &remote);
        let output = setup
            .execute(
                "git init -q && git config user.email t@example.com && git config user.name t \
                 && echo hi > README && git add README && git commit -qm init && git rev-parse HEAD",
            )
            .await
            .unwrap();
        assert!(output.success(), "{}", output.stderr);
        let sha = output.stdout.trim().to_string();

        let dir = work.path().join("checkout");
        let url = format!("file://{}", remote.display());
        let copy = GitCli::default()
            .checkout(&url, &sha, &dir)
            .await
            .unwrap();

        assert_eq!(copy.dir(), dir);
        assert_eq!(std::fs::read_to_string(dir.join("README")).unwrap(), "hi\n");
    }
}
