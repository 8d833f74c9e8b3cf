//! Provider traits for the cloud services emr-loader drives.
//!
//! Each provider abstracts one external service so the pipeline can run
//! against the real AWS clients in production and against the in-memory
//! mocks in [`crate::testing`] in tests.

mod aws_emr;
mod aws_s3;

pub use aws_emr::AwsEmr;
pub use aws_s3::AwsS3;

use crate::config::EmrConfig;
use crate::model::{ClusterDescription, ClusterSpec, StepSpec, StepState, StepSummary};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Errors reported by a provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource description.
        resource: String,
    },

    /// The caller is not allowed to perform the operation.
    #[error("Access denied during {operation}: {message}")]
    AccessDenied {
        /// API operation name.
        operation: &'static str,
        /// Service message.
        message: String,
    },

    /// Any other service-side or transport failure.
    #[error("{operation} failed: {message}")]
    Service {
        /// API operation name.
        operation: &'static str,
        /// Error description including its source chain.
        message: String,
    },

    /// The service answered without a field the pipeline needs.
    #[error("Unexpected {operation} response: {message}")]
    InvalidResponse {
        /// API operation name.
        operation: &'static str,
        /// What was missing.
        message: String,
    },

    /// A local file could not be streamed.
    #[error("Failed to read '{}': {message}", path.display())]
    LocalFile {
        /// Local path.
        path: PathBuf,
        /// Reason.
        message: String,
    },
}

impl ProviderError {
    /// Whether this is the "resource does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify a service error by its error code.
    pub(crate) fn from_code(operation: &'static str, code: Option<&str>, message: String) -> Self {
        match code {
            Some("AccessDenied" | "AccessDeniedException" | "Forbidden") => {
                Self::AccessDenied { operation, message }
            }
            _ => Self::Service { operation, message },
        }
    }
}

/// Compute-cluster control plane.
pub trait ClusterProvider: Send + Sync {
    /// Start provisioning a cluster and return its identifier.
    fn create_cluster<'a>(&'a self, spec: &'a ClusterSpec) -> ProviderFuture<'a, String>;

    /// Fetch the current state of a cluster.
    fn describe_cluster<'a>(&'a self, cluster_id: &'a str)
    -> ProviderFuture<'a, ClusterDescription>;

    /// Submit steps in order and return their identifiers.
    fn add_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        steps: &'a [StepSpec],
    ) -> ProviderFuture<'a, Vec<String>>;

    /// List steps of a cluster, restricted to `states` unless it is empty.
    fn list_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        states: &'a [StepState],
    ) -> ProviderFuture<'a, Vec<StepSummary>>;
}

/// Object storage.
pub trait StorageProvider: Send + Sync {
    /// Succeed if the bucket exists and is reachable.
    ///
    /// A missing bucket is reported as [`ProviderError::NotFound`].
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()>;

    /// Create a bucket in the provider's region.
    fn create_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()>;

    /// Upload a local file, replacing any existing object.
    fn upload_file<'a>(
        &'a self,
        path: &'a Path,
        bucket: &'a str,
        key: &'a str,
    ) -> ProviderFuture<'a, ()>;
}

/// Load the shared AWS configuration for the configured region.
///
/// Static credentials from the config take precedence over the default
/// provider chain.
pub async fn load_aws_config(emr: &EmrConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(emr.region_name.clone()));

    if let Some((access_key, secret_key)) = emr.static_credentials() {
        tracing::debug!("Using static credentials from configuration");
        loader = loader.credentials_provider(aws_sdk_emr::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "emr-loader-config",
        ));
    }

    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_codes_are_classified() {
        for code in ["AccessDenied", "AccessDeniedException", "Forbidden"] {
            let err = ProviderError::from_code("HeadBucket", Some(code), "nope".into());
            assert!(matches!(err, ProviderError::AccessDenied { .. }), "{}", code);
        }
    }

    #[test]
    fn other_codes_are_service_errors() {
        let err = ProviderError::from_code("RunJobFlow", Some("ValidationException"), "bad".into());
        assert!(matches!(err, ProviderError::Service { .. }));
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "RunJobFlow failed: bad");
    }
}
