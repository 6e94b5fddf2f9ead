//! Bundle manifest: the packaged, installable build and its components.
//!
//! Schema 1.0:
//!
//! ```yaml
//! schema-version: '1.0'
//! build:
//!   name: OpenSearch
//!   version: 1.1.0
//!   architecture: x64
//!   location: bundles/1.1.0/15/x64/opensearch-1.1.0-linux-x64.tar.gz
//!   id: 15
//! components:
//!   - name: index-management
//!     repository: https://github.com/opensearch-project/index-management.git
//!     ref: main
//!     commit_id: 7b6f0a2d
//!     location: bundle/index-management.zip
//! ```

use serde::{Deserialize, Serialize};

use super::{schema_version, validate_component_names, Manifest};
use crate::error::ManifestError;

/// Immutable view of the outputs of an assemble step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(rename = "schema-version", with = "schema_version")]
    pub schema_version: String,
    pub build: BuildDescriptor,
    pub components: Vec<ComponentDescriptor>,
}

/// The packaged distribution under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Distribution name, e.g. `OpenSearch`.
    pub name: String,
    pub version: String,
    /// Target architecture, e.g. `x64` or `arm64`.
    pub architecture: String,
    /// Remote location of the packaged artifact (object key or URL).
    pub location: String,
    pub id: u64,
}

/// One component packaged into the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub repository: String,
    /// Git ref that was built (sha, branch or tag).
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// The resolved commit that was actually built.
    pub commit_id: String,
    /// Location of the component's artifact relative to the bundle.
    pub location: String,
}

impl BuildDescriptor {
    /// Name of the directory the packaged artifact unpacks into,
    /// e.g. `opensearch-1.1.0`.
    pub fn install_dir_name(&self) -> String {
        format!("{}-{}", self.name.to_lowercase(), self.version)
    }
}

impl BundleManifest {
    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.name == name)
    }
}

impl Manifest for BundleManifest {
    const KIND: &'static str = "bundle";

    fn validate(&self) -> Result<(), ManifestError> {
        if self.build.version.trim().is_empty() {
            return Err(ManifestError::Invalid(
                "bundle manifest build.version must not be empty".into(),
            ));
        }
        if self.build.location.trim().is_empty() {
            return Err(ManifestError::Invalid(
                "bundle manifest build.location must not be empty".into(),
            ));
        }
        validate_component_names(Self::KIND, self.components.iter().map(|c| c.name.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SAMPLE: &str = r#"
schema-version: 1.0
build:
  name: OpenSearch
  version: 1.1.0
  architecture: x64
  location: bundles/1.1.0/15/x64/opensearch-1.1.0-linux-x64.tar.gz
  id: 15
components:
  - name: OpenSearch
    repository: https://github.com/opensearch-project/OpenSearch.git
    ref: '1.1'
    commit_id: ab12f137
    location: bundle/opensearch-min-1.1.0-linux-x64.tar.gz
  - name: index-management
    repository: https://github.com/opensearch-project/index-management.git
    ref: main
    commit_id: 7b6f0a2d
    location: plugins/opensearch-index-management-1.1.0.0.zip
"#;

    #[test]
    fn parses_sample() {
        let manifest = BundleManifest::from_yaml(SAMPLE).expect("parse");
        assert_eq!(manifest.schema_version, "1.0");
        assert_eq!(manifest.build.name, "OpenSearch");
        assert_eq!(manifest.build.id, 15);
        assert_eq!(manifest.components.len(), 2);
        assert_eq!(manifest.components[0].git_ref, "1.1");
        assert_eq!(
            manifest.component("index-management").map(|c| c.commit_id.as_str()),
            Some("7b6f0a2d")
        );
    }

    #[test]
    fn install_dir_name_is_lowercased_name_and_version() {
        let manifest = BundleManifest::from_yaml(SAMPLE).expect("parse");
        assert_eq!(manifest.build.install_dir_name(), "opensearch-1.1.0");
    }

    #[test]
    fn rejects_unsupported_version() {
        let text = SAMPLE.replace("schema-version: 1.0", "schema-version: 2.0");
        assert_matches!(
            BundleManifest::from_yaml(&text),
            Err(ManifestError::UnsupportedVersion(v)) if v == "2.0"
        );
    }

    #[test]
    fn rejects_missing_build_section() {
        let text = "schema-version: '1.0'\ncomponents: []\n";
        assert_matches!(BundleManifest::from_yaml(text), Err(ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_missing_schema_version() {
        let text = SAMPLE.replace("schema-version: 1.0", "");
        assert_matches!(BundleManifest::from_yaml(&text), Err(ManifestError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_components() {
        let text = SAMPLE.replace("name: OpenSearch\n    repository", "name: index-management\n    repository");
        assert_matches!(BundleManifest::from_yaml(&text), Err(ManifestError::Invalid(_)));
    }
}
