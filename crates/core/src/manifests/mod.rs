//! Loaders for the three manifest kinds that drive a test run.
//!
//! - [`BundleManifest`]: the packaged build and the components inside it.
//! - [`BuildManifest`]: where each component's source came from.
//! - [`TestManifest`]: which components declare integration or
//!   backward-compatibility tests.
//!
//! All three are YAML documents carrying a `schema-version` field. Only
//! [`SCHEMA_VERSION`] is accepted; anything else is rejected before the
//! rest of the document is interpreted.

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ManifestError;

pub mod build;
pub mod bundle;

pub use build::{BuildInfo, BuildManifest, ComponentSource};
pub use bundle::{BuildDescriptor, BundleManifest, ComponentDescriptor};
pub use test::{SuiteConfig, TestManifest, TestSupportDescriptor};

/// The only supported manifest schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Maximum length of a component name.
const MAX_COMPONENT_NAME_LEN: usize = 128;

/// Common load/save behaviour shared by every manifest kind.
pub trait Manifest: Sized + Serialize + DeserializeOwned {
    /// Human-readable kind used in log lines and error messages.
    const KIND: &'static str;

    /// Kind-specific structural checks run after deserialization.
    fn validate(&self) -> Result<(), ManifestError> {
        Ok(())
    }

    /// Parse a manifest from YAML text.
    ///
    /// The schema version is checked on the raw document first so an
    /// unsupported version is reported as such even when the rest of the
    /// document no longer matches the 1.0 layout.
    fn from_yaml(text: &str) -> Result<Self, ManifestError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let version = value.get("schema-version").ok_or_else(|| {
            ManifestError::Invalid(format!("{} manifest is missing schema-version", Self::KIND))
        })?;
        let version = schema_version::from_value(version)?;
        if version != SCHEMA_VERSION {
            return Err(ManifestError::UnsupportedVersion(version));
        }

        let manifest: Self = serde_yaml::from_value(value)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let manifest = Self::from_yaml(&text)?;
        tracing::debug!(kind = Self::KIND, path = %path.display(), "Loaded manifest");
        Ok(manifest)
    }

    /// Serialize back to YAML.
    fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Component names become directory names under the work dir, so only
/// alphanumerics, hyphen, underscore and dot are allowed.
pub fn is_safe_component_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COMPONENT_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Reject empty, unsafe or duplicated component names.
pub(crate) fn validate_component_names<'a>(
    kind: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();
    for name in names {
        if !is_safe_component_name(name) {
            return Err(ManifestError::Invalid(format!(
                "{kind} manifest has an invalid component name '{name}'"
            )));
        }
        if !seen.insert(name) {
            return Err(ManifestError::Invalid(format!(
                "{kind} manifest lists component '{name}' more than once"
            )));
        }
    }
    Ok(())
}

/// Serde adapter for `schema-version`.
///
/// YAML writers emit `schema-version: 1.0` (a float) as often as
/// `schema-version: "1.0"`; both read back as the string `"1.0"`. The
/// value is always written as a string.
pub(crate) mod schema_version {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::error::ManifestError;

    pub fn from_value(value: &serde_yaml::Value) -> Result<String, ManifestError> {
        match value {
            serde_yaml::Value::String(s) => Ok(s.clone()),
            serde_yaml::Value::Number(n) => match (n.as_u64(), n.as_f64()) {
                (Some(int), _) => Ok(int.to_string()),
                // `{:?}` keeps the trailing `.0` that `Display` drops.
                (None, Some(float)) => Ok(format!("{float:?}")),
                (None, None) => Ok(n.to_string()),
            },
            other => Err(ManifestError::Invalid(format!(
                "schema-version must be a string or number, got {other:?}"
            ))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        from_value(&value).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S: Serializer>(version: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
