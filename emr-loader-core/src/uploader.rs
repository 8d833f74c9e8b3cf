//! Script bucket management and uploads.

use crate::config::ScriptLocation;
use crate::error::{LoaderError, LoaderResult};
use crate::model::script_file_name;
use crate::provider::StorageProvider;
use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Ensures the script bucket exists and uploads local scripts into it.
#[derive(Clone)]
pub struct AssetUploader {
    provider: Arc<dyn StorageProvider>,
    strict_bucket_check: bool,
    span: Span,
}

impl AssetUploader {
    /// Create an uploader logging into `span`.
    pub fn new(provider: Arc<dyn StorageProvider>, span: Span) -> Self {
        Self {
            provider,
            strict_bucket_check: false,
            span,
        }
    }

    /// Propagate head-bucket errors other than "not found".
    pub fn with_strict_bucket_check(mut self, strict: bool) -> Self {
        self.strict_bucket_check = strict;
        self
    }

    /// Make sure `bucket` exists, creating it when the check says it does not.
    ///
    /// Without the strict check, any other head-bucket failure also leads to
    /// a create attempt and is logged as a warning.
    pub async fn ensure_bucket(&self, bucket: &str) -> LoaderResult<()> {
        self.check_or_create(bucket)
            .instrument(self.span.clone())
            .await
    }

    async fn check_or_create(&self, bucket: &str) -> LoaderResult<()> {
        match self.provider.head_bucket(bucket).await {
            Ok(()) => {
                tracing::info!(bucket = %bucket, "Bucket already exists");
                return Ok(());
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(bucket = %bucket, "Bucket does not exist, creating it");
            }
            Err(err) if self.strict_bucket_check => return Err(err.into()),
            Err(err) => {
                tracing::warn!(
                    bucket = %bucket,
                    error = %err,
                    "Bucket check failed for a reason other than not-found, trying to create it"
                );
            }
        }

        self.provider.create_bucket(bucket).await?;
        tracing::info!(bucket = %bucket, "Bucket created");
        Ok(())
    }

    /// Upload `local_path` to `bucket`/`key`, replacing any existing object.
    pub async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> LoaderResult<()> {
        self.put(local_path, bucket, key)
            .instrument(self.span.clone())
            .await
    }

    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> LoaderResult<()> {
        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| LoaderError::Asset {
                path: local_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !metadata.is_file() {
            return Err(LoaderError::Asset {
                path: local_path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        tracing::info!(
            file = %local_path.display(),
            bucket = %bucket,
            key = %key,
            bytes = metadata.len(),
            "Uploading file"
        );
        self.provider.upload_file(local_path, bucket, key).await?;
        Ok(())
    }

    /// Ensure the bucket once, then upload every script under the location
    /// prefix. Returns the `s3://` URI of each script, in order.
    pub async fn upload_scripts(
        &self,
        location: &ScriptLocation,
        scripts: &[&Path],
    ) -> LoaderResult<Vec<String>> {
        self.ensure_bucket(&location.bucket).await?;

        let mut uris = Vec::with_capacity(scripts.len());
        for script in scripts {
            let file_name = script_file_name(script)?;
            self.upload(script, &location.bucket, &location.key(file_name))
                .await?;
            uris.push(location.uri(file_name));
        }
        Ok(uris)
    }
}
