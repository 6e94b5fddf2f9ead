//! Shell script executor.
//!
//! Runs `bash <script> <args...>` so checked-out scripts work even when
//! their execute bit was lost.

use std::path::Path;

use super::executor::{ScriptError, ScriptExecutor, ScriptInput, ScriptOutput};
use super::subprocess;

/// Executor for shell (bash) scripts.
pub struct ShellExecutor;

impl ScriptExecutor for ShellExecutor {
    async fn execute(
        &self,
        script_path: &Path,
        input: ScriptInput,
    ) -> Result<ScriptOutput, ScriptError> {
        if tokio::fs::metadata(script_path).await.is_err() {
            return Err(ScriptError::NotFound(script_path.display().to_string()));
        }

        tracing::debug!(
            script = %script_path.display(),
            args = ?input.args,
            cwd = %input.working_directory.display(),
            "Running shell script",
        );

        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg(script_path);
        subprocess::run_command(&mut cmd, input).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
