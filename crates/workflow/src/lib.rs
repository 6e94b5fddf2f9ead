//! Orchestration of a bundle integration-test run: configuration, source
//! checkouts, common dependencies, per-component suites, and result
//! recording around a [`bundle_cluster::TestCluster`].

pub mod config;
pub mod dependencies;
pub mod driver;
pub mod error;
pub mod git;
pub mod recorder;
pub mod suite;

#[cfg(test)]
mod test_support;

pub use driver::{run_workflow, select_components, FinishedRun, Manifests, Orchestrator};
pub use error::WorkflowError;
