//! Shared subprocess management.
//!
//! [`run_command`] holds the spawn + capture + timeout logic. Executors
//! build a [`tokio::process::Command`] for their runtime and delegate here.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::executor::{ScriptError, ScriptInput, ScriptOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Integration-test runners are verbose; anything past this is dropped.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd`, capture stdout/stderr, and enforce the input's timeout.
///
/// The caller sets the program and any leading arguments; the input's
/// arguments, environment and working directory are applied here.
pub async fn run_command(
    cmd: &mut Command,
    input: ScriptInput,
) -> Result<ScriptOutput, ScriptError> {
    // `kill_on_drop(true)` kills the child when the timeout drops it.
    cmd.args(&input.args)
        .current_dir(&input.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &input.env_vars {
        cmd.env(key, value);
    }

    let start = Instant::now();

    let mut child = cmd.spawn()?;

    // Drain stdout/stderr in spawned tasks so `child.wait()` can borrow
    // the child and a chatty script cannot fill the pipe and stall.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(input.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();

            Ok(ScriptOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ScriptError::IoError(e)),
        Err(_elapsed) => Err(ScriptError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

/// Read a whole output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}
