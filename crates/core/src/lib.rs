//! Domain types shared by the bundle test workflow: manifests, object-store
//! locations, test outcomes, and script discovery/invocation.
//!
//! Nothing here talks to the network; subprocess handling is limited to
//! running local scripts.

pub mod error;
pub mod locations;
pub mod manifests;
pub mod outcome;
pub mod scripting;

/// Names of the components every integration suite depends on. They are
/// checked out once per run, not once per component.
pub const COMMON_DEPENDENCIES: &[&str] = &["OpenSearch", "common-utils", "job-scheduler", "alerting"];
