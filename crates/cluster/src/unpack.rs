//! Bundle archive handling: checksum and gzip tar extraction.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tar::Archive;

use crate::ClusterError;

/// Hex SHA-256 of a file.
pub async fn sha256_file(path: &Path) -> Result<String, ClusterError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path).map_err(|e| ClusterError::io(&path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).map_err(|e| ClusterError::io(&path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| ClusterError::Unpack(format!("checksum task failed: {e}")))?
}

/// Extract a `.tar.gz` into `dest_dir` and return `dest_dir/expected_dir`,
/// which must exist afterwards.
pub async fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
    expected_dir: &str,
) -> Result<PathBuf, ClusterError> {
    let archive_path = archive_path.to_path_buf();
    let dest = dest_dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file =
            std::fs::File::open(&archive_path).map_err(|e| ClusterError::io(&archive_path, e))?;
        let mut archive = Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        archive.unpack(&dest).map_err(|e| {
            ClusterError::Unpack(format!("failed to extract {}: {e}", archive_path.display()))
        })
    })
    .await
    .map_err(|e| ClusterError::Unpack(format!("extraction task failed: {e}")))??;

    let install_dir = dest_dir.join(expected_dir);
    if !install_dir.is_dir() {
        return Err(ClusterError::Unpack(format!(
            "expected directory {} not found after extraction",
            install_dir.display()
        )));
    }
    Ok(install_dir)
}
