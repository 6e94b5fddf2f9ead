//! Script execution interface and shared types.
//!
//! Defines [`ScriptExecutor`], implemented by the runtime executors, along
//! with [`ScriptInput`], [`ScriptOutput`], and [`ScriptError`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a script should be invoked.
#[derive(Debug, Clone)]
pub struct ScriptInput {
    /// Positional and flag arguments, passed verbatim after the script path.
    pub args: Vec<String>,
    /// Additional environment variables set for the child process.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child process. Always explicit; the
    /// orchestrator never changes its own current directory.
    pub working_directory: PathBuf,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ScriptInput {
    pub fn new(working_directory: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            args: Vec::new(),
            env_vars: Vec::new(),
            working_directory: working_directory.into(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

/// Captured output from a script execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("Script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Implemented by script runtime executors.
///
/// An executor receives a script path and an invocation, spawns the
/// subprocess, and returns the captured output. A non-zero exit is not an
/// error at this layer; callers decide what it means.
pub trait ScriptExecutor: Send + Sync {
    fn execute(
        &self,
        script_path: &Path,
        input: ScriptInput,
    ) -> impl std::future::Future<Output = Result<ScriptOutput, ScriptError>> + Send;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
