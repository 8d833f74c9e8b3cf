//! emr-loader - provision an EMR cluster and run its setup steps.
//!
//! This crate provides:
//! - YAML configuration loading and validation
//! - Script bucket management and uploads to S3
//! - Cluster creation and readiness polling on EMR
//! - Setup step submission and completion polling
//! - Provider traits with AWS and in-memory implementations
//! - Scoped `tracing` setup with per-component spans

pub mod config;
pub mod error;
pub mod launcher;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod poll;
pub mod provider;
pub mod readiness;
pub mod steps;
pub mod testing;
pub mod uploader;

pub use config::{EmrConfig, LoaderConfig, PollConfig, ScriptLocation};
pub use error::{LoaderError, LoaderResult};
pub use orchestrator::{OrchestrationOutcome, Orchestrator, Plan, RunReport};
pub use poll::{PollPolicy, Shutdown, ShutdownTrigger};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{EmrConfig, LoaderConfig, PollConfig, ScriptLocation};
    pub use crate::error::{LoaderError, LoaderResult};
    pub use crate::launcher::ClusterLauncher;
    pub use crate::model::{
        ClusterHandle, ClusterSpec, ClusterState, StepBatchHandle, StepSpec, StepState,
    };
    pub use crate::orchestrator::{OrchestrationOutcome, Orchestrator, Plan, RunReport};
    pub use crate::poll::{PollDecision, PollPolicy, Shutdown, ShutdownTrigger, poll};
    pub use crate::provider::{ClusterProvider, ProviderError, StorageProvider};
    pub use crate::readiness::{Readiness, StatusPoller};
    pub use crate::steps::{StepPoller, StepSubmitter};
    pub use crate::uploader::AssetUploader;
}
