//! Error types for emr-loader.

use crate::provider::ProviderError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while provisioning a cluster and running its setup.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{}': {source}", path.display())]
    ConfigIo {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// The configuration parsed but failed validation.
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// A local script could not be read for upload.
    #[error("Failed to read asset '{}': {reason}", path.display())]
    Asset {
        /// Local path of the asset.
        path: PathBuf,
        /// Reason the asset could not be read.
        reason: String,
    },

    /// A cloud API call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A submitted step ended in a state from which it cannot complete.
    #[error("Step {step_id} on cluster {cluster_id} ended in state {state}")]
    StepFailed {
        /// Cluster identifier.
        cluster_id: String,
        /// Step identifier.
        step_id: String,
        /// Terminal step state.
        state: String,
    },

    /// A poll loop ran out of attempts or time.
    #[error("Gave up waiting for {what} after {attempts} attempts ({elapsed:?})")]
    PollTimeout {
        /// What was being waited for.
        what: String,
        /// Number of fetches performed.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// A poll loop was interrupted by a shutdown signal.
    #[error("Cancelled while waiting for {what}")]
    Cancelled {
        /// What was being waited for.
        what: String,
    },
}

/// Result type for emr-loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    /// Build an [`LoaderError::InvalidConfig`] from a single message.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(vec![message.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_joins_all_messages() {
        let err = LoaderError::InvalidConfig(vec![
            "instance_count must be at least 1".into(),
            "poll.interval_secs must be greater than 0".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: instance_count must be at least 1; \
             poll.interval_secs must be greater than 0"
        );
    }

    #[test]
    fn provider_errors_are_transparent() {
        let err: LoaderError = ProviderError::NotFound {
            resource: "bucket scripts".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Resource not found: bucket scripts");
    }
}
