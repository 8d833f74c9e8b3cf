//! Domain types shared by the pipeline components and the providers.

use crate::config::{EmrConfig, ScriptLocation};
use crate::error::{LoaderError, LoaderResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Declarative description of the cluster to launch.
///
/// Built once from configuration and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
    /// Total number of instances, master included.
    pub instance_count: i32,
    /// Master instance type.
    pub master_instance_type: String,
    /// Core instance type.
    pub slave_instance_type: String,
    /// EC2 key pair name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Subnet id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Log destination URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_uri: Option<String>,
    /// EMR release label.
    pub release_label: String,
    /// Applications to install.
    pub applications: Vec<String>,
    /// Bootstrap action run on every node.
    pub bootstrap_action: BootstrapAction,
    /// Keep the cluster alive once all steps are done.
    pub keep_alive_when_no_steps: bool,
    /// Protect the cluster from termination.
    pub termination_protected: bool,
    /// Make the cluster visible to every IAM user of the account.
    pub visible_to_all_users: bool,
    /// Instance profile of the nodes.
    pub job_flow_role: String,
    /// Service role of EMR.
    pub service_role: String,
}

/// A named bootstrap script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapAction {
    /// Action name.
    pub name: String,
    /// `s3://` URI of the script.
    pub script_uri: String,
}

impl ClusterSpec {
    /// Build the cluster description from configuration.
    ///
    /// Sizing and networking fields are copied verbatim.
    pub fn from_config(emr: &EmrConfig, location: &ScriptLocation) -> LoaderResult<Self> {
        let bootstrap_file = script_file_name(&emr.bootstrap_script)?;

        Ok(Self {
            name: emr.cluster_name.clone(),
            instance_count: emr.instance_count,
            master_instance_type: emr.master_instance_type.clone(),
            slave_instance_type: emr.slave_instance_type.clone(),
            key_name: emr.key_name.clone(),
            subnet_id: emr.subnet_id.clone(),
            log_uri: emr.log_uri.clone(),
            release_label: emr.software_version.clone(),
            applications: emr.applications.clone(),
            bootstrap_action: BootstrapAction {
                name: emr.bootstrap_action_name.clone(),
                script_uri: location.uri(bootstrap_file),
            },
            keep_alive_when_no_steps: true,
            termination_protected: false,
            visible_to_all_users: true,
            job_flow_role: emr.job_flow_role.clone(),
            service_role: emr.service_role.clone(),
        })
    }
}

/// File name component of a local script path, used as its object key.
pub fn script_file_name(path: &Path) -> LoaderResult<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoaderError::Asset {
            path: path.to_path_buf(),
            reason: "path has no UTF-8 file name".to_string(),
        })
}

/// Cluster lifecycle state as reported by EMR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterState {
    Starting,
    Bootstrapping,
    Running,
    Waiting,
    Terminating,
    Terminated,
    TerminatedWithErrors,
    /// A state token this version does not know about.
    Unknown(String),
}

impl ClusterState {
    /// The cluster accepts steps.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// The cluster is gone and will never accept steps.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::TerminatedWithErrors)
    }

    /// Wire token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "STARTING",
            Self::Bootstrapping => "BOOTSTRAPPING",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::TerminatedWithErrors => "TERMINATED_WITH_ERRORS",
            Self::Unknown(token) => token,
        }
    }
}

impl From<&str> for ClusterState {
    fn from(token: &str) -> Self {
        match token {
            "STARTING" => Self::Starting,
            "BOOTSTRAPPING" => Self::Bootstrapping,
            "RUNNING" => Self::Running,
            "WAITING" => Self::Waiting,
            "TERMINATING" => Self::Terminating,
            "TERMINATED" => Self::Terminated,
            "TERMINATED_WITH_ERRORS" => Self::TerminatedWithErrors,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClusterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Snapshot of a cluster returned by describe-cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescription {
    /// Cluster identifier.
    pub id: String,
    /// Current state.
    pub state: ClusterState,
    /// Reason of the last state change.
    pub reason: Option<String>,
    /// Public DNS of the master node, once assigned.
    pub master_public_dns: Option<String>,
}

/// Local view of a launched cluster.
///
/// Only ever updated from a fresh [`ClusterDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterHandle {
    /// Cluster identifier.
    pub id: String,
    /// Master DNS name; fixed once observed.
    pub master_dns: Option<String>,
    /// Last observed state.
    pub state: ClusterState,
    /// Reason of the last state change.
    pub reason: Option<String>,
}

impl ClusterHandle {
    /// Handle for a cluster that was just created.
    pub fn launched(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            master_dns: None,
            state: ClusterState::Starting,
            reason: None,
        }
    }

    /// Apply a describe-cluster result.
    ///
    /// Returns `true` when this call latched the master DNS name.
    pub fn observe(&mut self, description: ClusterDescription) -> bool {
        self.state = description.state;
        self.reason = description.reason;

        if self.master_dns.is_none() && description.master_public_dns.is_some() {
            self.master_dns = description.master_public_dns;
            return true;
        }
        false
    }
}

/// What EMR does with the cluster when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOnFailure {
    TerminateJobFlow,
    TerminateCluster,
    CancelAndWait,
    Continue,
}

impl ActionOnFailure {
    /// Wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminateJobFlow => "TERMINATE_JOB_FLOW",
            Self::TerminateCluster => "TERMINATE_CLUSTER",
            Self::CancelAndWait => "CANCEL_AND_WAIT",
            Self::Continue => "CONTINUE",
        }
    }
}

impl Serialize for ActionOnFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A shell command run on the master node through a jar runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSpec {
    /// Step name.
    pub name: String,
    /// Failure policy.
    pub action_on_failure: ActionOnFailure,
    /// Jar executing the command.
    pub jar: String,
    /// Command and arguments.
    pub args: Vec<String>,
}

/// Identifiers of a batch of submitted steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepBatchHandle {
    /// Step ids in submission order.
    pub step_ids: Vec<String>,
}

impl StepBatchHandle {
    /// Number of submitted steps.
    pub fn len(&self) -> usize {
        self.step_ids.len()
    }

    /// Whether nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.step_ids.is_empty()
    }

    /// Whether `step_id` belongs to this batch.
    pub fn contains(&self, step_id: &str) -> bool {
        self.step_ids.iter().any(|id| id == step_id)
    }
}

/// Step lifecycle state as reported by EMR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    Pending,
    CancelPending,
    Running,
    Completed,
    Cancelled,
    Failed,
    Interrupted,
    /// A state token this version does not know about.
    Unknown(String),
}

impl StepState {
    /// The step stopped without completing and never will.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::Interrupted)
    }

    /// Wire token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::CancelPending => "CANCEL_PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Interrupted => "INTERRUPTED",
            Self::Unknown(token) => token,
        }
    }
}

impl From<&str> for StepState {
    fn from(token: &str) -> Self {
        match token {
            "PENDING" => Self::Pending,
            "CANCEL_PENDING" => Self::CancelPending,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            "FAILED" => Self::Failed,
            "INTERRUPTED" => Self::Interrupted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of list-steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    /// Step identifier.
    pub id: String,
    /// Step name.
    pub name: String,
    /// Current state.
    pub state: StepState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;

    fn description(state: &str, dns: Option<&str>) -> ClusterDescription {
        ClusterDescription {
            id: "j-1".into(),
            state: state.into(),
            reason: Some("reason".into()),
            master_public_dns: dns.map(String::from),
        }
    }

    #[test]
    fn cluster_spec_copies_sizing_and_network_verbatim() {
        let config = LoaderConfig::from_yaml(
            "emr:\n  instance_count: 3\n  key_name: k1\n  subnet_id: subnet-9\n  \
             master_instance_type: c5.large\n  script_uri: s3://b/scripts\n",
        )
        .unwrap();
        let location = config.emr.script_location().unwrap();
        let spec = ClusterSpec::from_config(&config.emr, &location).unwrap();

        assert_eq!(spec.instance_count, 3);
        assert_eq!(spec.key_name.as_deref(), Some("k1"));
        assert_eq!(spec.subnet_id.as_deref(), Some("subnet-9"));
        assert_eq!(spec.master_instance_type, "c5.large");
        assert_eq!(
            spec.bootstrap_action.script_uri,
            "s3://b/scripts/bootstrap_actions.sh"
        );
        assert!(spec.keep_alive_when_no_steps);
        assert!(!spec.termination_protected);
    }

    #[test]
    fn cluster_state_round_trips_unknown_tokens() {
        let state = ClusterState::from("RESIZING");
        assert_eq!(state, ClusterState::Unknown("RESIZING".into()));
        assert_eq!(state.as_str(), "RESIZING");
        assert!(!state.is_ready());
        assert!(!state.is_terminal());
    }

    #[test]
    fn only_waiting_is_ready_and_only_terminated_states_are_terminal() {
        for token in ["STARTING", "BOOTSTRAPPING", "RUNNING", "TERMINATING"] {
            let state = ClusterState::from(token);
            assert!(!state.is_ready(), "{}", token);
            assert!(!state.is_terminal(), "{}", token);
        }
        assert!(ClusterState::Waiting.is_ready());
        assert!(!ClusterState::Waiting.is_terminal());
        assert!(ClusterState::Terminated.is_terminal());
        assert!(ClusterState::TerminatedWithErrors.is_terminal());
    }

    #[test]
    fn handle_latches_first_dns_name() {
        let mut handle = ClusterHandle::launched("j-1");
        assert!(!handle.observe(description("STARTING", None)));
        assert!(handle.observe(description("BOOTSTRAPPING", Some("ip-1.ec2"))));
        assert!(!handle.observe(description("WAITING", Some("ip-2.ec2"))));

        assert_eq!(handle.master_dns.as_deref(), Some("ip-1.ec2"));
        assert_eq!(handle.state, ClusterState::Waiting);
    }

    #[test]
    fn handle_keeps_dns_when_later_description_has_none() {
        let mut handle = ClusterHandle::launched("j-1");
        handle.observe(description("RUNNING", Some("ip-1.ec2")));
        handle.observe(description("TERMINATING", None));
        assert_eq!(handle.master_dns.as_deref(), Some("ip-1.ec2"));
    }

    #[test]
    fn step_failure_states() {
        assert!(StepState::Failed.is_failure());
        assert!(StepState::Cancelled.is_failure());
        assert!(StepState::Interrupted.is_failure());
        assert!(!StepState::Completed.is_failure());
        assert!(!StepState::from("PENDING").is_failure());
    }
}
