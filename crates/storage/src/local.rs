//! Directory-backed [`ArtifactStore`]. Keys map to paths under the root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bundle_core::locations::file_name_of_key;

use crate::{relative_target, ArtifactStore, StorageError};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

/// Every regular file under `dir`, as `/`-separated keys relative to `root`.
async fn list_keys(root: &Path, dir: &Path) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .map_err(|e| StorageError::io(&current, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&current, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(root) {
                    let key: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    keys.push(key.join("/"));
                }
            }
        }
    }
    keys.sort();
    Ok(keys)
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn download_file(&self, key: &str, local_dir: &Path) -> Result<PathBuf, StorageError> {
        let source = self.path_of(key);
        if !source.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let target = local_dir.join(file_name_of_key(key));
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| StorageError::io(&source, e))?;
        tracing::debug!(key, target = %target.display(), "Copied object from local store");
        Ok(target)
    }

    async fn download_folder(
        &self,
        prefix: &str,
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let prefix = prefix.trim_start_matches('/');
        // A key prefix may end mid-name; walk from its directory part.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let dir = self.root.join(dir_part);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }

        let mut written = Vec::new();
        let mut matched_any = false;
        for key in list_keys(&self.root, &dir).await? {
            if !key.starts_with(prefix) {
                continue;
            }
            matched_any = true;
            let Some(target) = relative_target(prefix, &key, local_dir) else {
                continue;
            };
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::io(parent, e))?;
            }
            let source = self.path_of(&key);
            tokio::fs::copy(&source, &target)
                .await
                .map_err(|e| StorageError::io(&source, e))?;
            written.push(target);
        }

        if !matched_any {
            return Err(StorageError::NotFound(prefix.to_string()));
        }
        Ok(written)
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let target = self.path_of(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| StorageError::io(local_path, e))?;
        tracing::debug!(key, "Stored object in local store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;

    use super::*;

    fn seeded() -> (tempfile::TempDir, LocalStore) {
        let root = tempfile::tempdir().expect("root");
        let put = |key: &str, body: &str| {
            let path = root.path().join(key);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, body).expect("write");
        };
        put("bundles/1.1.0/15/x64/manifest.yml", "bundle");
        put("builds/1.1.0/15/x64/maven/org/a/a-1.jar", "a");
        put("builds/1.1.0/15/x64/maven/org/b/b-1.pom", "b");
        put("builds/1.1.0/15/x64/manifest.yml", "build");
        let store = LocalStore::new(root.path());
        (root, store)
    }

    #[tokio::test]
    async fn download_file_keeps_name() {
        let (_root, store) = seeded();
        let out = tempfile::tempdir().expect("out");

        let path = store
            .download_file("bundles/1.1.0/15/x64/manifest.yml", out.path())
            .await
            .expect("download");

        assert_eq!(path, out.path().join("manifest.yml"));
        assert_eq!(fs::read_to_string(path).expect("read"), "bundle");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_root, store) = seeded();
        let out = tempfile::tempdir().expect("out");

        let err = store
            .download_file("bundles/9.9.9/1/x64/manifest.yml", out.path())
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn download_folder_preserves_relative_paths() {
        let (_root, store) = seeded();
        let out = tempfile::tempdir().expect("out");

        let mut written = store
            .download_folder("builds/1.1.0/15/x64/maven/", out.path())
            .await
            .expect("download folder");
        written.sort();

        assert_eq!(
            written,
            vec![
                out.path().join("org/a/a-1.jar"),
                out.path().join("org/b/b-1.pom"),
            ]
        );
        assert!(!out.path().join("manifest.yml").exists());
    }

    #[tokio::test]
    async fn empty_prefix_is_not_found() {
        let (_root, store) = seeded();
        let out = tempfile::tempdir().expect("out");

        let result = store.download_folder("tests/1.1.0/", out.path()).await;
        assert_matches!(result, Err(StorageError::NotFound(p)) if p == "tests/1.1.0/");
    }

    #[tokio::test]
    async fn upload_creates_parents() {
        let (root, store) = seeded();
        let source = tempfile::NamedTempFile::new().expect("source");
        fs::write(source.path(), "results").expect("write");

        store
            .upload_file(source.path(), "tests/1.1.0/15/x64/integ-test/test-results.json")
            .await
            .expect("upload");

        let stored = root
            .path()
            .join("tests/1.1.0/15/x64/integ-test/test-results.json");
        assert_eq!(fs::read_to_string(stored).expect("read"), "results");
    }
}
