//! Fakes shared by the workflow unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use bundle_core::manifests::ComponentDescriptor;

use crate::git::{GitError, SourceControl, WorkingCopy};

pub fn component(name: &str) -> ComponentDescriptor {
    ComponentDescriptor {
        name: name.into(),
        repository: format!("https://github.com/opensearch-project/{name}.git"),
        git_ref: "main".into(),
        commit_id: format!("sha-{name}"),
        location: format!("plugins/{name}.zip"),
    }
}

/// Creates checkout directories instead of cloning, optionally dropping an
/// `integtest.sh` into them.
#[derive(Default)]
pub struct FakeGit {
    scripts: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    checkouts: Mutex<Vec<(String, String)>>,
}

impl FakeGit {
    /// Checkouts into a directory named `name` get an `integtest.sh` with `body`.
    pub fn script(&self, name: &str, body: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), body.to_string());
    }

    pub fn fail_checkout(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// `(directory name, revision)` of every successful checkout, in order.
    pub fn checkouts(&self) -> Vec<(String, String)> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeGit {
    async fn checkout(
        &self,
        url: &str,
        revision: &str,
        dir: &Path,
    ) -> Result<WorkingCopy, GitError> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.failing.lock().unwrap().contains(&name) {
            return Err(GitError::Command {
                command: format!("git fetch --depth 1 origin {revision}"),
                exit_code: 128,
                stderr: "fatal: couldn't find remote ref".into(),
            });
        }

        std::fs::create_dir_all(dir).unwrap();
        let body = self.scripts.lock().unwrap().get(&name).cloned();
        if let Some(body) = body {
            std::fs::write(dir.join("integtest.sh"), format!("#!/bin/bash\n{body}")).unwrap();
        }
        self.checkouts
            .lock()
            .unwrap()
            .push((name, revision.to_string()));
        Ok(WorkingCopy::new(url, revision, dir))
    }
}
