//! Locates per-component build and integration-test scripts.
//!
//! Lookup order, first existing file wins:
//!
//! 1. `<scripts>/components/<component>/<file>`: a per-component override
//!    shipped with the workflow.
//! 2. The component checkout itself (`<checkout>/<file>`, and for builds
//!    also `<checkout>/scripts/build.sh`).
//! 3. `<scripts>/default/<file>`: the standard script.

use std::path::{Path, PathBuf};

pub const BUILD_SCRIPT: &str = "build.sh";
pub const INTEG_TEST_SCRIPT: &str = "integtest.sh";

#[derive(Debug, Clone)]
pub struct ScriptFinder {
    component_scripts: PathBuf,
    default_scripts: PathBuf,
}

impl ScriptFinder {
    /// Finder rooted at a scripts directory with `components/` and
    /// `default/` children.
    pub fn new(scripts_root: impl AsRef<Path>) -> Self {
        let root = scripts_root.as_ref();
        Self {
            component_scripts: root.join("components"),
            default_scripts: root.join("default"),
        }
    }

    pub fn find_build_script(&self, component: &str, checkout: &Path) -> Option<PathBuf> {
        self.find(
            component,
            BUILD_SCRIPT,
            &[checkout.join(BUILD_SCRIPT), checkout.join("scripts").join(BUILD_SCRIPT)],
        )
    }

    pub fn find_integ_test_script(&self, component: &str, checkout: &Path) -> Option<PathBuf> {
        self.find(component, INTEG_TEST_SCRIPT, &[checkout.join(INTEG_TEST_SCRIPT)])
    }

    fn find(&self, component: &str, file: &str, in_checkout: &[PathBuf]) -> Option<PathBuf> {
        let override_path = self.component_scripts.join(component).join(file);
        let default_path = self.default_scripts.join(file);

        let found = std::iter::once(override_path)
            .chain(in_checkout.iter().cloned())
            .chain(std::iter::once(default_path))
            .find(|candidate| candidate.is_file());

        match &found {
            Some(path) => tracing::debug!(component, script = %path.display(), "Found script"),
            None => tracing::debug!(component, file, "No script found"),
        }
        found
    }
}
