//! Per-component test outcomes and run-level aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifests::BuildDescriptor;

/// Result of one component's test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub component: String,
    pub status: TestStatus,
    /// Exit status of the test script, when it ran to completion.
    pub exit_code: Option<i32>,
    /// Why the component was skipped or failed.
    pub reason: Option<String>,
}

impl TestOutcome {
    pub fn passed(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: TestStatus::Passed,
            exit_code: Some(0),
            reason: None,
        }
    }

    pub fn failed(
        component: impl Into<String>,
        exit_code: Option<i32>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            status: TestStatus::Failed,
            exit_code,
            reason: Some(reason.into()),
        }
    }

    pub fn skipped(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: TestStatus::Skipped,
            exit_code: None,
            reason: Some(reason.into()),
        }
    }
}

/// Everything recorded about one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub distribution: String,
    pub version: String,
    pub architecture: String,
    pub build_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<TestOutcome>,
}

impl RunReport {
    /// Empty report for a run against `build`, started now.
    pub fn start(run_id: impl Into<String>, build: &BuildDescriptor) -> Self {
        Self {
            run_id: run_id.into(),
            distribution: build.name.clone(),
            version: build.version.clone(),
            architecture: build.architecture.clone(),
            build_id: build.id,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: TestOutcome) {
        tracing::info!(
            component = %outcome.component,
            status = outcome.status.label(),
            exit_code = ?outcome.exit_code,
            "Recorded test outcome",
        );
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// A run fails when any component failed; skips do not count.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|o| o.status == TestStatus::Failed)
    }

    pub fn with_status(&self, status: TestStatus) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }

    /// Multi-line, human-readable summary naming every skipped and failed
    /// component.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} {} ({}, build {}): {}",
            self.distribution,
            self.version,
            self.architecture,
            self.build_id,
            if self.is_success() { "PASSED" } else { "FAILED" }
        )];
        for status in [TestStatus::Passed, TestStatus::Failed, TestStatus::Skipped] {
            let names: Vec<String> = self
                .with_status(status)
                .map(|o| match &o.reason {
                    Some(reason) if status != TestStatus::Passed => {
                        format!("{} ({reason})", o.component)
                    }
                    _ => o.component.clone(),
                })
                .collect();
            if !names.is_empty() {
                lines.push(format!("  {}: {}", status.label(), names.join(", ")));
            }
        }
        lines.join("\n")
    }
}
