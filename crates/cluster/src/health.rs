//! Client for the cluster health endpoint.
//!
//! Wraps `GET /_cluster/health` using [`reqwest`]. Test clusters use
//! self-signed certificates, so certificate verification is off.

use std::time::Duration;

use serde::Deserialize;

use crate::ClusterEndpoint;

pub const HEALTH_PATH: &str = "/_cluster/health";

/// HTTP client for one cluster's health endpoint.
pub struct HealthClient {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, String)>,
}

/// The subset of the health response we act on.
#[derive(Debug, Deserialize)]
pub struct ClusterHealth {
    /// `green`, `yellow` or `red`.
    pub status: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

impl ClusterHealth {
    pub fn is_green(&self) -> bool {
        self.status == "green"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// The HTTP request itself failed (connect, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The cluster answered with a non-200 status code.
    #[error("Health endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not a health document.
    #[error("Malformed health response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl HealthClient {
    /// Client for `endpoint`. Credentials are only attached when the
    /// endpoint has security enabled.
    pub fn new(
        endpoint: &ClusterEndpoint,
        request_timeout: Duration,
        username: &str,
        password: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(request_timeout)
            .build()?;
        let credentials = endpoint
            .security_enabled
            .then(|| (username.to_string(), password.to_string()));
        Ok(Self {
            client,
            url: endpoint.url(HEALTH_PATH),
            credentials,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the current cluster health.
    pub async fn cluster_health(&self) -> Result<ClusterHealth, HealthError> {
        let mut request = self.client.get(&self.url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), body = %body, "Health response");
        if status != reqwest::StatusCode::OK {
            return Err(HealthError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
