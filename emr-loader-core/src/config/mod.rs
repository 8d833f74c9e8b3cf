//! Configuration for emr-loader.
//!
//! The configuration is a YAML document with a single `emr` root key:
//!
//! ```yaml
//! emr:
//!   region_name: eu-west-1
//!   cluster_name: analytics
//!   instance_count: 3
//!   master_instance_type: m5.xlarge
//!   slave_instance_type: m5.xlarge
//!   key_name: ops-key
//!   subnet_id: subnet-0abc
//!   log_uri: s3://my-logs/emr/
//!   software_version: emr-6.15.0
//!   script_bucket_name: my-emr-scripts
//!   poll:
//!     interval_secs: 10
//!     timeout_secs: 3600
//! ```
//!
//! Every field has a default except the script location, which is given
//! either as `script_bucket_name` or as an `s3://bucket/prefix` `script_uri`.
//! Credentials fall back to the AWS default provider chain when omitted.

mod loader;

use crate::error::{LoaderError, LoaderResult};
use crate::poll::PollPolicy;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root of the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Cluster, credential and script settings.
    pub emr: EmrConfig,
}

/// Settings under the `emr` key.
#[derive(Debug, Clone, Deserialize)]
pub struct EmrConfig {
    /// Static access key id. Uses the default credential chain when absent.
    #[serde(default)]
    pub aws_access_key: Option<SecretString>,

    /// Static secret access key.
    #[serde(default)]
    pub aws_secret_access_key: Option<SecretString>,

    /// AWS region for both EMR and S3.
    #[serde(default = "default_region")]
    pub region_name: String,

    /// Cluster name shown in the EMR console.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Total number of instances, master included.
    #[serde(default = "default_instance_count")]
    pub instance_count: i32,

    /// Instance type of the master node.
    #[serde(default = "default_instance_type")]
    pub master_instance_type: String,

    /// Instance type of the core nodes.
    #[serde(default = "default_instance_type")]
    pub slave_instance_type: String,

    /// EC2 key pair used for SSH access to the nodes.
    #[serde(default)]
    pub key_name: Option<String>,

    /// Subnet the cluster is launched into.
    #[serde(default)]
    pub subnet_id: Option<String>,

    /// Destination of the cluster logs.
    #[serde(default)]
    pub log_uri: Option<String>,

    /// EMR release label, e.g. `emr-6.15.0`.
    #[serde(default = "default_software_version")]
    pub software_version: String,

    /// Bucket holding the scripts, at its root.
    #[serde(default)]
    pub script_bucket_name: Option<String>,

    /// `s3://bucket/prefix` holding the scripts. Takes precedence over
    /// `script_bucket_name`.
    #[serde(default)]
    pub script_uri: Option<String>,

    /// Local bootstrap action script, run on every node at startup.
    #[serde(default = "default_bootstrap_script")]
    pub bootstrap_script: PathBuf,

    /// Local setup script, copied to and run on the master node as a step.
    #[serde(default = "default_setup_script")]
    pub setup_script: PathBuf,

    /// Applications installed on the cluster.
    #[serde(default = "default_applications")]
    pub applications: Vec<String>,

    /// Name of the bootstrap action.
    #[serde(default = "default_bootstrap_action_name")]
    pub bootstrap_action_name: String,

    /// Instance profile assumed by the cluster nodes.
    #[serde(default = "default_job_flow_role")]
    pub job_flow_role: String,

    /// Service role assumed by EMR.
    #[serde(default = "default_service_role")]
    pub service_role: String,

    /// Propagate head-bucket failures other than "not found" instead of
    /// attempting to create the bucket.
    #[serde(default)]
    pub strict_bucket_check: bool,

    /// Polling cadence and limits.
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_cluster_name() -> String {
    "emr-loader".to_string()
}

fn default_instance_count() -> i32 {
    3
}

fn default_instance_type() -> String {
    "m5.xlarge".to_string()
}

fn default_software_version() -> String {
    "emr-6.15.0".to_string()
}

fn default_bootstrap_script() -> PathBuf {
    PathBuf::from("scripts/bootstrap_actions.sh")
}

fn default_setup_script() -> PathBuf {
    PathBuf::from("scripts/pyspark_quick_setup.sh")
}

fn default_applications() -> Vec<String> {
    vec!["Spark".to_string()]
}

fn default_bootstrap_action_name() -> String {
    "Install Conda".to_string()
}

fn default_job_flow_role() -> String {
    "EMR_EC2_DefaultRole".to_string()
}

fn default_service_role() -> String {
    "EMR_DefaultRole".to_string()
}

impl EmrConfig {
    /// Resolve where the scripts live in S3.
    pub fn script_location(&self) -> LoaderResult<ScriptLocation> {
        match (&self.script_uri, &self.script_bucket_name) {
            (Some(uri), _) => ScriptLocation::parse(uri),
            (None, Some(bucket)) => Ok(ScriptLocation::bucket_root(bucket)),
            (None, None) => Err(LoaderError::invalid_config(
                "one of script_bucket_name or script_uri is required",
            )),
        }
    }

    /// Static credentials, when both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key, &self.aws_secret_access_key) {
            (Some(key), Some(secret)) => Some((key.expose(), secret.expose())),
            _ => None,
        }
    }
}

/// Polling cadence and optional limits shared by both poll loops.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between two fetches.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Give up after this many fetches. Unbounded when absent.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds. Unbounded when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_interval_secs() -> u64 {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: None,
            timeout_secs: None,
        }
    }
}

impl PollConfig {
    /// Convert into a [`PollPolicy`].
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: self.max_attempts,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Bucket and key prefix the scripts are uploaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix, empty or ending in `/`.
    pub prefix: String,
}

impl ScriptLocation {
    /// Scripts stored at the root of `bucket`.
    pub fn bucket_root(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
        }
    }

    /// Parse an `s3://bucket[/prefix]` URI.
    pub fn parse(uri: &str) -> LoaderResult<Self> {
        let rest = uri.strip_prefix("s3://").ok_or_else(|| {
            LoaderError::invalid_config(format!("script_uri '{}' must start with s3://", uri))
        })?;

        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(LoaderError::invalid_config(format!(
                "script_uri '{}' has no bucket",
                uri
            )));
        }

        let prefix = prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// Object key for a file name.
    pub fn key(&self, file_name: &str) -> String {
        format!("{}{}", self.prefix, file_name)
    }

    /// Full `s3://` URI for a file name.
    pub fn uri(&self, file_name: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.key(file_name))
    }
}

/// A string that never shows up in `Debug` output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"<redacted>\"")
    }
}
