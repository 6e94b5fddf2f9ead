//! Build manifest: source provenance for every component in a build.
//!
//! Schema 1.0:
//!
//! ```yaml
//! schema-version: '1.0'
//! build:
//!   name: OpenSearch
//!   version: 1.1.0
//!   architecture: x64
//!   id: 15
//! components:
//!   - name: common-utils
//!     repository: https://github.com/opensearch-project/common-utils.git
//!     ref: main
//!     commit_id: 3913d7097934cbfe1fdcf919347f22a597d00b76
//!     version: 1.1.0.0
//!     artifacts:
//!       maven:
//!         - maven/org/opensearch/common-utils/1.1.0.0/common-utils-1.1.0.0.jar
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{schema_version, validate_component_names, Manifest};
use crate::error::ManifestError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    #[serde(rename = "schema-version", with = "schema_version")]
    pub schema_version: String,
    pub build: BuildInfo,
    pub components: Vec<ComponentSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub id: u64,
}

/// Where a component's source came from and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSource {
    pub name: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Artifact paths grouped by type (`maven`, `plugins`, `libs`, `bundle`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, Vec<String>>,
}

impl BuildManifest {
    pub fn component(&self, name: &str) -> Option<&ComponentSource> {
        self.components.iter().find(|c| c.name == name)
    }
}

impl Manifest for BuildManifest {
    const KIND: &'static str = "build";

    fn validate(&self) -> Result<(), ManifestError> {
        validate_component_names(Self::KIND, self.components.iter().map(|c| c.name.as_str()))
    }
}
