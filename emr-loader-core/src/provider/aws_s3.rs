//! S3-backed [`StorageProvider`].

use super::{ProviderError, ProviderFuture, StorageProvider};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;

/// Region where S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Storage provider talking to S3.
#[derive(Debug, Clone)]
pub struct AwsS3 {
    client: Client,
    region: String,
}

impl AwsS3 {
    /// Create a provider from shared AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        let region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self {
            client: Client::new(config),
            region,
        }
    }

    /// Wrap an existing client; buckets are created in `region`.
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        (self.region != DEFAULT_REGION).then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build()
        })
    }
}

fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    ProviderError::from_code(
        operation,
        code.as_deref(),
        DisplayErrorContext(&err).to_string(),
    )
}

impl StorageProvider for AwsS3 {
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(()),
                Err(err) => {
                    let modeled_not_found = err
                        .as_service_error()
                        .map(|e| e.is_not_found())
                        .unwrap_or(false);
                    let status = err.raw_response().map(|r| r.status().as_u16());

                    // HEAD responses carry no body, so a 403 arrives without an error code.
                    match (modeled_not_found, status) {
                        (true, _) | (_, Some(404)) => Err(ProviderError::NotFound {
                            resource: format!("bucket {}", bucket),
                        }),
                        (_, Some(403)) => Err(ProviderError::AccessDenied {
                            operation: "HeadBucket",
                            message: DisplayErrorContext(&err).to_string(),
                        }),
                        _ => Err(sdk_error("HeadBucket", err)),
                    }
                }
            }
        })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .create_bucket()
                .bucket(bucket)
                .set_create_bucket_configuration(self.bucket_configuration())
                .send()
                .await
                .map_err(|e| sdk_error("CreateBucket", e))?;
            Ok(())
        })
    }

    fn upload_file<'a>(
        &'a self,
        path: &'a Path,
        bucket: &'a str,
        key: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| ProviderError::LocalFile {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| sdk_error("PutObject", e))?;
            Ok(())
        })
    }
}
