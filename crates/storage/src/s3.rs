//! S3-backed [`ArtifactStore`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bundle_core::locations::file_name_of_key;
use tokio::io::AsyncWriteExt;

use crate::{relative_target, ArtifactStore, StorageError};

/// One S3 bucket holding bundles, builds and test results.
#[derive(Clone)]
pub struct S3Bucket {
    client: Client,
    bucket: String,
}

impl S3Bucket {
    /// Build a client from the ambient AWS configuration (environment,
    /// profile, instance role). `region` overrides the configured region.
    pub async fn new(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let config = loader.load().await;
        Self::with_client(Client::new(&config), bucket)
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Stream one object to `target`, removing the partial file on failure.
    async fn download_to(&self, key: &str, target: &Path) -> Result<(), StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(key, e))?;

        let result = write_body(output.body, target).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(target).await;
        }
        result
    }
}

async fn write_body(mut body: ByteStream, target: &Path) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|e| StorageError::io(target, e))?;

    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| StorageError::Transport(format!("download interrupted: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| StorageError::io(target, e))?;
    }
    file.flush().await.map_err(|e| StorageError::io(target, e))
}

fn classify_get_error<R>(key: &str, err: SdkError<GetObjectError, R>) -> StorageError
where
    R: std::fmt::Debug,
{
    let no_such_key = err
        .as_service_error()
        .is_some_and(|service| service.is_no_such_key());
    if no_such_key {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Transport(DisplayErrorContext(&err).to_string())
    }
}

#[async_trait]
impl ArtifactStore for S3Bucket {
    async fn download_file(&self, key: &str, local_dir: &Path) -> Result<PathBuf, StorageError> {
        let target = local_dir.join(file_name_of_key(key));
        tracing::info!(bucket = %self.bucket, key, target = %target.display(), "Downloading object");
        self.download_to(key, &target).await?;
        Ok(target)
    }

    async fn download_folder(
        &self,
        prefix: &str,
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let prefix = prefix.trim_start_matches('/');
        tracing::info!(bucket = %self.bucket, prefix, "Downloading folder");

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut written = Vec::new();
        let mut listed_any = false;
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::Transport(DisplayErrorContext(&e).to_string()))?;
            for object in page.contents() {
                listed_any = true;
                let Some(key) = object.key() else { continue };
                let Some(target) = relative_target(prefix, key, local_dir) else {
                    continue;
                };
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StorageError::io(parent, e))?;
                }
                self.download_to(key, &target).await?;
                written.push(target);
            }
        }

        if !listed_any {
            return Err(StorageError::NotFound(prefix.to_string()));
        }
        tracing::info!(prefix, files = written.len(), "Folder downloaded");
        Ok(written)
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::io(local_path, std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Transport(DisplayErrorContext(&e).to_string()))?;

        tracing::info!(bucket = %self.bucket, key, "Uploaded object");
        Ok(())
    }
}
