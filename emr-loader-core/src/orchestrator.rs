//! End-to-end provisioning run.
//!
//! [`Orchestrator::run`] performs, in order:
//!
//! 1. ensure the script bucket exists and upload both scripts
//! 2. create the cluster with the uploaded bootstrap script
//! 3. poll until the cluster is `WAITING` (or has terminated)
//! 4. submit the setup steps with the master DNS name
//! 5. poll until every submitted step has completed
//!
//! Each stage runs inside its own component span under the run span.

use crate::config::{EmrConfig, LoaderConfig, ScriptLocation};
use crate::error::{LoaderError, LoaderResult};
use crate::launcher::ClusterLauncher;
use crate::model::{ClusterHandle, ClusterSpec, StepBatchHandle, StepSpec, script_file_name};
use crate::poll::Shutdown;
use crate::provider::{
    AwsEmr, AwsS3, ClusterProvider, ProviderError, StorageProvider, load_aws_config,
};
use crate::readiness::{Readiness, StatusPoller};
use crate::steps::{StepPoller, StepSubmitter, setup_steps};
use crate::uploader::AssetUploader;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Stand-in for the master DNS name in a plan built before launch.
pub const MASTER_DNS_PLACEHOLDER: &str = "<master-dns>";

/// One local script and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedUpload {
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    pub uri: String,
}

/// Everything a run will send, derived from configuration alone.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Uploads in order: bootstrap script, then setup script.
    pub uploads: Vec<PlannedUpload>,
    /// Create-cluster request.
    pub cluster: ClusterSpec,
    /// Setup steps, with [`MASTER_DNS_PLACEHOLDER`] for the master DNS name.
    pub steps: Vec<StepSpec>,
    #[serde(skip)]
    location: ScriptLocation,
    #[serde(skip)]
    setup_file_name: String,
}

impl Plan {
    /// Build the plan for `emr`.
    pub fn from_config(emr: &EmrConfig) -> LoaderResult<Self> {
        let location = emr.script_location()?;
        let cluster = ClusterSpec::from_config(emr, &location)?;

        let mut uploads = Vec::with_capacity(2);
        for script in [&emr.bootstrap_script, &emr.setup_script] {
            let file_name = script_file_name(script)?;
            uploads.push(PlannedUpload {
                local_path: script.clone(),
                bucket: location.bucket.clone(),
                key: location.key(file_name),
                uri: location.uri(file_name),
            });
        }

        let setup_file_name = script_file_name(&emr.setup_script)?.to_string();
        let steps = setup_steps(
            &location.uri(&setup_file_name),
            &setup_file_name,
            MASTER_DNS_PLACEHOLDER,
        );

        Ok(Self {
            uploads,
            cluster,
            steps,
            location,
            setup_file_name,
        })
    }

    /// `s3://` URI of the setup script.
    pub fn setup_script_uri(&self) -> String {
        self.location.uri(&self.setup_file_name)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrchestrationOutcome {
    /// Every setup step completed.
    Completed {
        cluster: ClusterHandle,
        steps: StepBatchHandle,
    },
    /// The cluster terminated before it became ready; no steps were sent.
    ClusterTerminated { cluster: ClusterHandle },
}

impl OrchestrationOutcome {
    /// The cluster the run created.
    pub fn cluster(&self) -> &ClusterHandle {
        match self {
            Self::Completed { cluster, .. } | Self::ClusterTerminated { cluster } => cluster,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: OrchestrationOutcome,
}

/// Drives a full provisioning run against the injected providers.
pub struct Orchestrator {
    cluster: Arc<dyn ClusterProvider>,
    storage: Arc<dyn StorageProvider>,
    span: Span,
}

impl Orchestrator {
    /// Create an orchestrator with a fresh run span.
    pub fn new(cluster: Arc<dyn ClusterProvider>, storage: Arc<dyn StorageProvider>) -> Self {
        Self {
            cluster,
            storage,
            span: tracing::info_span!("emr_loader", cluster_id = tracing::field::Empty),
        }
    }

    /// Log into `span` instead of the default run span.
    ///
    /// A `cluster_id` field declared on the span is recorded once the
    /// cluster exists.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Orchestrator backed by the AWS EMR and S3 APIs.
    pub async fn from_aws(emr: &EmrConfig) -> Self {
        let sdk_config = load_aws_config(emr).await;
        Self::new(
            Arc::new(AwsEmr::new(&sdk_config)),
            Arc::new(AwsS3::new(&sdk_config)),
        )
    }

    /// Validate `config` and provision the cluster it describes.
    ///
    /// A cluster that terminates while starting up is not an error: the run
    /// ends with [`OrchestrationOutcome::ClusterTerminated`].
    pub async fn run(
        &self,
        config: &LoaderConfig,
        shutdown: &mut Shutdown,
    ) -> LoaderResult<RunReport> {
        let started_at = Utc::now();
        let outcome = self
            .execute(config, shutdown)
            .instrument(self.span.clone())
            .await?;

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            outcome,
        })
    }

    async fn execute(
        &self,
        config: &LoaderConfig,
        shutdown: &mut Shutdown,
    ) -> LoaderResult<OrchestrationOutcome> {
        config.validate()?;
        let emr = &config.emr;
        let plan = Plan::from_config(emr)?;
        let policy = emr.poll.policy();

        tracing::info!(
            cluster_name = %plan.cluster.name,
            region = %emr.region_name,
            bucket = %plan.location.bucket,
            "Starting provisioning run"
        );

        let uploader = AssetUploader::new(
            self.storage.clone(),
            crate::instrument_component!(&self.span, "uploader"),
        )
        .with_strict_bucket_check(emr.strict_bucket_check);
        ensure_running(shutdown, "script upload")?;
        uploader
            .upload_scripts(
                &plan.location,
                &[emr.bootstrap_script.as_path(), emr.setup_script.as_path()],
            )
            .await?;

        let launcher = ClusterLauncher::new(
            self.cluster.clone(),
            crate::instrument_component!(&self.span, "launcher"),
        );
        ensure_running(shutdown, "cluster creation")?;
        let mut handle = launcher.launch(&plan.cluster).await?;
        self.span.record("cluster_id", handle.id.as_str());

        let status = StatusPoller::new(
            self.cluster.clone(),
            policy,
            crate::instrument_component!(&self.span, "status"),
        );
        if status.wait(&mut handle, shutdown).await? == Readiness::Terminated {
            return Ok(OrchestrationOutcome::ClusterTerminated { cluster: handle });
        }

        let master_dns = handle.master_dns.clone().ok_or_else(|| {
            LoaderError::Provider(ProviderError::InvalidResponse {
                operation: "DescribeCluster",
                message: format!("cluster {} is ready without a master DNS name", handle.id),
            })
        })?;

        let submitter = StepSubmitter::new(
            self.cluster.clone(),
            plan.setup_script_uri(),
            plan.setup_file_name.clone(),
            crate::instrument_component!(&self.span, "steps"),
        );
        let batch = submitter.submit(&handle.id, &master_dns).await?;

        let steps = StepPoller::new(
            self.cluster.clone(),
            policy,
            crate::instrument_component!(&self.span, "steps"),
        );
        steps.wait(&handle.id, &batch, shutdown).await?;

        tracing::info!(cluster_id = %handle.id, master_dns = %master_dns, "Cluster is set up");
        Ok(OrchestrationOutcome::Completed {
            cluster: handle,
            steps: batch,
        })
    }
}

/// Refuse to start `stage` once shutdown was requested.
fn ensure_running(shutdown: &Shutdown, stage: &str) -> LoaderResult<()> {
    if shutdown.is_triggered() {
        tracing::info!(stage, "Shutdown requested, not starting stage");
        return Err(LoaderError::Cancelled {
            what: stage.to_string(),
        });
    }
    Ok(())
}
