//! Loading and validating the YAML configuration.

use super::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use std::path::Path;

impl LoaderConfig {
    /// Read, parse and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml(&content)
    }

    /// Parse and validate a configuration document.
    pub fn from_yaml(content: &str) -> LoaderResult<Self> {
        let config: LoaderConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration, reporting every problem at once.
    pub fn validate(&self) -> LoaderResult<()> {
        let emr = &self.emr;
        let mut errors = Vec::new();

        if emr.region_name.trim().is_empty() {
            errors.push("region_name must not be empty".to_string());
        }
        if emr.cluster_name.trim().is_empty() {
            errors.push("cluster_name must not be empty".to_string());
        }
        if emr.instance_count < 1 {
            errors.push(format!(
                "instance_count must be at least 1, got {}",
                emr.instance_count
            ));
        }
        if emr.software_version.trim().is_empty() {
            errors.push("software_version must not be empty".to_string());
        }
        if emr.applications.is_empty() {
            errors.push("applications must name at least one application".to_string());
        }

        match (&emr.aws_access_key, &emr.aws_secret_access_key) {
            (Some(_), None) => {
                errors.push("aws_access_key is set but aws_secret_access_key is not".to_string())
            }
            (None, Some(_)) => {
                errors.push("aws_secret_access_key is set but aws_access_key is not".to_string())
            }
            _ => {}
        }

        match emr.script_location() {
            Ok(location) if location.bucket.trim().is_empty() => {
                errors.push("script_bucket_name must not be empty".to_string());
            }
            Ok(_) => {}
            Err(LoaderError::InvalidConfig(messages)) => errors.extend(messages),
            Err(e) => errors.push(e.to_string()),
        }

        for (field, path) in [
            ("bootstrap_script", &emr.bootstrap_script),
            ("setup_script", &emr.setup_script),
        ] {
            if path.file_name().is_none() {
                errors.push(format!("{} '{}' has no file name", field, path.display()));
            }
        }

        if emr.poll.interval_secs == 0 {
            errors.push("poll.interval_secs must be greater than 0".to_string());
        }
        if emr.poll.max_attempts == Some(0) {
            errors.push("poll.max_attempts must be greater than 0".to_string());
        }
        if emr.poll.timeout_secs == Some(0) {
            errors.push("poll.timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoaderError::InvalidConfig(errors))
        }
    }
}
