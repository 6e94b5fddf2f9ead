use std::str::FromStr;
use std::time::Duration;

use crate::ClusterError;

/// Health poll tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPollConfig {
    /// Maximum number of health requests.
    pub attempts: u32,
    /// Wait after every unsuccessful attempt.
    pub delay: Duration,
    /// Upper bound on a single health request.
    pub request_timeout: Duration,
}

impl Default for HealthPollConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Settings for a local test cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Host test suites connect to (default: `localhost`).
    pub host: String,
    /// HTTP port (default: `9200`).
    pub port: u16,
    /// Run with the security plugin on (https + basic auth).
    pub security_enabled: bool,
    /// Start script inside the unpacked bundle.
    pub start_script: String,
    /// Cluster config file, relative to the unpacked bundle.
    pub config_file: String,
    /// Line appended to [`Self::config_file`] when security is off.
    pub security_disabled_line: String,
    pub username: String,
    pub password: String,
    pub health: HealthPollConfig,
    /// How long to wait after SIGTERM, and again after SIGKILL.
    pub shutdown_grace: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 9200,
            security_enabled: true,
            start_script: "opensearch-tar-install.sh".into(),
            config_file: "config/opensearch.yml".into(),
            security_disabled_line: "plugins.security.disabled: true".into(),
            username: "admin".into(),
            password: "admin".into(),
            health: HealthPollConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ClusterConfig {
    /// Defaults, overridden from the environment.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `CLUSTER_PORT`                | `9200`  |
    /// | `HEALTH_POLL_ATTEMPTS`        | `10`    |
    /// | `HEALTH_POLL_DELAY_SECS`      | `10`    |
    /// | `HEALTH_REQUEST_TIMEOUT_SECS` | `10`    |
    /// | `SHUTDOWN_GRACE_SECS`         | `10`    |
    pub fn from_env() -> Result<Self, ClusterError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClusterError> {
        let defaults = Self::default();

        let port = parse_or(&lookup, "CLUSTER_PORT", defaults.port)?;
        let attempts = parse_or(&lookup, "HEALTH_POLL_ATTEMPTS", defaults.health.attempts)?;
        if attempts == 0 {
            return Err(ClusterError::Config(
                "HEALTH_POLL_ATTEMPTS must be at least 1".into(),
            ));
        }
        let delay_secs = parse_or(&lookup, "HEALTH_POLL_DELAY_SECS", defaults.health.delay.as_secs())?;
        let timeout_secs = parse_or(
            &lookup,
            "HEALTH_REQUEST_TIMEOUT_SECS",
            defaults.health.request_timeout.as_secs(),
        )?;
        let grace_secs = parse_or(&lookup, "SHUTDOWN_GRACE_SECS", defaults.shutdown_grace.as_secs())?;

        Ok(Self {
            port,
            health: HealthPollConfig {
                attempts,
                delay: Duration::from_secs(delay_secs),
                request_timeout: Duration::from_secs(timeout_secs),
            },
            shutdown_grace: Duration::from_secs(grace_secs),
            ..defaults
        })
    }

    pub fn with_security(mut self, enabled: bool) -> Self {
        self.security_enabled = enabled;
        self
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ClusterError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ClusterError::Config(format!("{name} must be a valid {}", std::any::type_name::<T>()))
        }),
    }
}
