//! Object-store key layout for bundles, builds and test results.
//!
//! ```text
//! bundles/{version}/{build_id}/{arch}/manifest.yml
//! bundles/{version}/{build_id}/{arch}/opensearch-{version}-linux-{arch}.tar.gz
//! builds/{version}/{build_id}/{arch}/manifest.yml
//! builds/{version}/{build_id}/{arch}/maven/
//! tests/{version}/{build_id}/{arch}/integ-test/
//! ```

/// Identifies one build of the distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCoordinates {
    pub version: String,
    pub build_id: u64,
    pub architecture: String,
}

impl BuildCoordinates {
    pub fn new(version: impl Into<String>, build_id: u64, architecture: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            build_id,
            architecture: architecture.into(),
        }
    }

    fn path(&self, root: &str) -> String {
        format!(
            "{root}/{}/{}/{}",
            self.version, self.build_id, self.architecture
        )
    }

    pub fn bundle_manifest_key(&self) -> String {
        format!("{}/manifest.yml", self.path("bundles"))
    }

    pub fn build_manifest_key(&self) -> String {
        format!("{}/manifest.yml", self.path("builds"))
    }

    pub fn tarball_name(&self) -> String {
        format!(
            "opensearch-{}-linux-{}.tar.gz",
            self.version, self.architecture
        )
    }

    pub fn tarball_key(&self) -> String {
        format!("{}/{}", self.path("bundles"), self.tarball_name())
    }

    /// Prefix holding the build's published maven artifacts.
    pub fn maven_prefix(&self) -> String {
        format!("{}/maven/", self.path("builds"))
    }

    /// Prefix under which integration-test results are uploaded.
    pub fn integ_test_results_prefix(&self) -> String {
        format!("{}/integ-test/", self.path("tests"))
    }
}

/// Turn a manifest `location` into an object key.
///
/// URL locations (`s3://bucket/key`, `https://host/key`) keep only their
/// path; bare locations are already keys. Leading slashes are dropped
/// either way.
pub fn object_key_from_location(location: &str) -> &str {
    let path = match location.split_once("://") {
        Some((_scheme, rest)) => rest.find('/').map_or("", |idx| &rest[idx..]),
        None => location,
    };
    path.trim_start_matches('/')
}

/// Final path segment of an object key.
pub fn file_name_of_key(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
}
