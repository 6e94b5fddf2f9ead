//! Cluster process control and the SIGTERM/SIGKILL shutdown sequence.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;

use crate::ClusterError;

/// A running cluster process the shutdown sequence can signal and reap.
#[async_trait]
pub trait ClusterProcess: Send + Sync {
    fn pid(&self) -> u32;

    /// Ask the process to stop (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to stop (SIGKILL).
    fn kill(&mut self) -> io::Result<()>;

    /// Wait for exit. Returns the exit code, `None` when killed by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// How a stopped process went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub pid: u32,
    pub exit_code: Option<i32>,
    /// SIGKILL was needed.
    pub forced: bool,
}

/// A spawned child running in its own process group, so signals reach the
/// start script and everything it launched.
pub struct ChildProcess {
    child: Child,
    pid: u32,
}

impl ChildProcess {
    /// Wrap a freshly spawned child. Fails if it already exited and was
    /// reaped.
    pub fn new(child: Child) -> io::Result<Self> {
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("process exited before its pid was read"))?;
        Ok(Self { child, pid })
    }

    fn signal_group(&self, signal: libc::c_int) -> io::Result<()> {
        let Ok(pgid) = libc::pid_t::try_from(self.pid) else {
            return Err(io::Error::other(format!("pid {} out of range", self.pid)));
        };
        // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
        // addresses the process group created at spawn.
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        // Already gone.
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }
}

#[async_trait]
impl ClusterProcess for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.signal_group(libc::SIGTERM)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.signal_group(libc::SIGKILL)
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}

/// SIGTERM, wait up to `grace`; if still alive SIGKILL once and wait up to
/// `grace` again. A process that survives both is a [`ClusterError::ProcessLeak`].
pub async fn shut_down(
    process: &mut dyn ClusterProcess,
    grace: Duration,
) -> Result<ShutdownReport, ClusterError> {
    let pid = process.pid();

    tracing::info!(pid, "Sending SIGTERM to cluster process");
    if let Err(e) = process.terminate() {
        tracing::warn!(pid, error = %e, "SIGTERM failed");
    }
    if let Some(exit_code) = wait_within(process, grace).await? {
        return Ok(ShutdownReport {
            pid,
            exit_code,
            forced: false,
        });
    }

    tracing::warn!(pid, grace_secs = grace.as_secs(), "Process did not terminate, sending SIGKILL");
    process
        .kill()
        .map_err(|e| ClusterError::Io {
            path: format!("pid {pid}"),
            source: e,
        })?;
    if let Some(exit_code) = wait_within(process, grace).await? {
        return Ok(ShutdownReport {
            pid,
            exit_code,
            forced: true,
        });
    }

    tracing::error!(pid, "Process failed to terminate even after SIGKILL");
    Err(ClusterError::ProcessLeak { pid })
}

/// `Some(exit_code)` if the process exited within `grace`.
async fn wait_within(
    process: &mut dyn ClusterProcess,
    grace: Duration,
) -> Result<Option<Option<i32>>, ClusterError> {
    let pid = process.pid();
    match tokio::time::timeout(grace, process.wait()).await {
        Ok(Ok(exit_code)) => {
            tracing::info!(pid, exit_code = ?exit_code, "Cluster process exited");
            Ok(Some(exit_code))
        }
        Ok(Err(e)) => Err(ClusterError::Io {
            path: format!("pid {pid}"),
            source: e,
        }),
        Err(_) => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::fake::{ExitsOn, FakeProcess};
    use super::*;

    const GRACE: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_sends_only_sigterm() {
        let mut process = FakeProcess::new(ExitsOn::Term);

        let report = shut_down(&mut process, GRACE).await.unwrap();

        assert!(!report.forced);
        assert_eq!(report.exit_code, Some(143));
        assert_eq!((process.terms, process.kills), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_sigterm_escalates_to_one_sigkill() {
        let start = tokio::time::Instant::now();
        let mut process = FakeProcess::new(ExitsOn::Kill);

        let report = shut_down(&mut process, GRACE).await.unwrap();

        assert!(report.forced);
        assert_eq!(report.exit_code, None);
        assert_eq!((process.terms, process.kills), (1, 1));
        assert_eq!(start.elapsed(), GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn surviving_sigkill_is_a_leak() {
        let mut process = FakeProcess::new(ExitsOn::Never);

        let result = shut_down(&mut process, GRACE).await;

        assert_matches!(result, Err(ClusterError::ProcessLeak { pid: 4242 }));
        assert_eq!((process.terms, process.kills), (1, 1));
    }

    #[tokio::test]
    async fn real_child_stops_on_sigterm() {
        let mut command = tokio::process::Command::new("sleep");
        command.arg("30").process_group(0);
        let mut process = ChildProcess::new(command.spawn().unwrap()).unwrap();

        let report = shut_down(&mut process, GRACE).await.unwrap();

        assert!(!report.forced);
        // Killed by signal, so no exit code.
        assert_eq!(report.exit_code, None);
    }
}
