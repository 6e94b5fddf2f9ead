//! Bounded readiness polling.
//!
//! [`poll_until_ready`] calls a probe up to `attempts` times with a fixed
//! delay after every unsuccessful attempt. Unlike a reconnect loop there is
//! no backoff and no indefinite retry: the cluster either turns ready within
//! the budget or creation fails.

use std::future::Future;

use crate::{ClusterError, HealthPollConfig};

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(String),
}

/// Probe until ready. Returns the 1-based attempt that succeeded.
pub async fn poll_until_ready<F, Fut>(
    config: &HealthPollConfig,
    mut probe: F,
) -> Result<u32, ClusterError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Readiness>,
{
    for attempt in 1..=config.attempts {
        tracing::info!(attempt, max_attempts = config.attempts, "Pinging cluster health");

        match probe(attempt).await {
            Readiness::Ready => {
                tracing::info!(attempt, "Cluster is green");
                return Ok(attempt);
            }
            Readiness::NotReady(reason) => {
                tracing::info!(attempt, reason = %reason, "Cluster not ready yet");
            }
        }

        tokio::time::sleep(config.delay).await;
    }

    Err(ClusterError::Creation(format!(
        "Cluster is not green after {} attempts",
        config.attempts
    )))
}
