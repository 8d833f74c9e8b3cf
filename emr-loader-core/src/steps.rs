//! Setup steps: what gets submitted and how completion is tracked.

use crate::error::{LoaderError, LoaderResult};
use crate::model::{ActionOnFailure, StepBatchHandle, StepSpec, StepState, StepSummary};
use crate::poll::{PollDecision, PollPolicy, Shutdown, poll};
use crate::provider::ClusterProvider;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Jar EMR uses to run arbitrary commands on the master node.
pub const COMMAND_RUNNER_JAR: &str = "command-runner.jar";

/// Directory on the master node the setup script is copied into.
pub const MASTER_SCRIPT_DIR: &str = "/home/hadoop/";

/// The two setup steps, in submission order.
///
/// 1. copy the setup script from S3 to [`MASTER_SCRIPT_DIR`]
/// 2. run it with the master DNS name as its only argument
pub fn setup_steps(setup_script_uri: &str, setup_file_name: &str, master_dns: &str) -> Vec<StepSpec> {
    vec![
        StepSpec {
            name: "setup - copy files".to_string(),
            action_on_failure: ActionOnFailure::CancelAndWait,
            jar: COMMAND_RUNNER_JAR.to_string(),
            args: vec![
                "aws".to_string(),
                "s3".to_string(),
                "cp".to_string(),
                setup_script_uri.to_string(),
                MASTER_SCRIPT_DIR.to_string(),
            ],
        },
        StepSpec {
            name: "setup pyspark with conda".to_string(),
            action_on_failure: ActionOnFailure::CancelAndWait,
            jar: COMMAND_RUNNER_JAR.to_string(),
            args: vec![
                "sudo".to_string(),
                "bash".to_string(),
                format!("{}{}", MASTER_SCRIPT_DIR, setup_file_name),
                master_dns.to_string(),
            ],
        },
    ]
}

/// Submits the setup steps to a ready cluster.
#[derive(Clone)]
pub struct StepSubmitter {
    provider: Arc<dyn ClusterProvider>,
    setup_script_uri: String,
    setup_file_name: String,
    span: Span,
}

impl StepSubmitter {
    /// Create a submitter for the setup script at `setup_script_uri`.
    pub fn new(
        provider: Arc<dyn ClusterProvider>,
        setup_script_uri: impl Into<String>,
        setup_file_name: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            provider,
            setup_script_uri: setup_script_uri.into(),
            setup_file_name: setup_file_name.into(),
            span,
        }
    }

    /// Steps that [`submit`](Self::submit) sends for `master_dns`.
    pub fn steps(&self, master_dns: &str) -> Vec<StepSpec> {
        setup_steps(&self.setup_script_uri, &self.setup_file_name, master_dns)
    }

    /// Submit the setup steps in one request.
    pub async fn submit(&self, cluster_id: &str, master_dns: &str) -> LoaderResult<StepBatchHandle> {
        self.add(cluster_id, master_dns)
            .instrument(self.span.clone())
            .await
    }

    async fn add(&self, cluster_id: &str, master_dns: &str) -> LoaderResult<StepBatchHandle> {
        let steps = self.steps(master_dns);
        tracing::info!(
            cluster_id = %cluster_id,
            master_dns = %master_dns,
            count = steps.len(),
            "Submitting setup steps"
        );

        let step_ids = self.provider.add_steps(cluster_id, &steps).await?;

        tracing::info!(cluster_id = %cluster_id, step_ids = ?step_ids, "Steps submitted");
        Ok(StepBatchHandle { step_ids })
    }
}

/// One poll of step progress.
#[derive(Debug)]
struct StepProgress {
    completed: usize,
    steps: Vec<StepSummary>,
}

/// Polls list-steps until every submitted step has completed.
#[derive(Clone)]
pub struct StepPoller {
    provider: Arc<dyn ClusterProvider>,
    policy: PollPolicy,
    span: Span,
}

impl StepPoller {
    /// Create a poller logging into `span`.
    pub fn new(provider: Arc<dyn ClusterProvider>, policy: PollPolicy, span: Span) -> Self {
        Self {
            provider,
            policy,
            span,
        }
    }

    /// Poll until the number of completed steps of `batch` equals its size.
    ///
    /// Fails as soon as a step of the batch is failed, cancelled or
    /// interrupted, since it can no longer complete.
    pub async fn wait(
        &self,
        cluster_id: &str,
        batch: &StepBatchHandle,
        shutdown: &mut Shutdown,
    ) -> LoaderResult<()> {
        let provider = self.provider.as_ref();

        poll(
            "step completion",
            &self.policy,
            shutdown,
            move || fetch_progress(provider, cluster_id, batch),
            |progress| classify(cluster_id, batch, progress),
        )
        .instrument(self.span.clone())
        .await
    }
}

async fn fetch_progress(
    provider: &dyn ClusterProvider,
    cluster_id: &str,
    batch: &StepBatchHandle,
) -> LoaderResult<StepProgress> {
    let completed = provider
        .list_steps(cluster_id, &[StepState::Completed])
        .await?
        .iter()
        .filter(|step| batch.contains(&step.id))
        .count();

    if completed == batch.len() {
        return Ok(StepProgress {
            completed,
            steps: Vec::new(),
        });
    }

    let steps = provider
        .list_steps(cluster_id, &[])
        .await?
        .into_iter()
        .filter(|step| batch.contains(&step.id))
        .collect();

    Ok(StepProgress { completed, steps })
}

fn classify(
    cluster_id: &str,
    batch: &StepBatchHandle,
    progress: StepProgress,
) -> LoaderResult<PollDecision<()>> {
    if progress.completed == batch.len() {
        tracing::info!(cluster_id = %cluster_id, completed = progress.completed, "All steps completed");
        return Ok(PollDecision::Done(()));
    }

    if let Some(failed) = progress.steps.iter().find(|step| step.state.is_failure()) {
        tracing::error!(
            cluster_id = %cluster_id,
            step_id = %failed.id,
            step = %failed.name,
            state = %failed.state,
            "Step can no longer complete"
        );
        return Err(LoaderError::StepFailed {
            cluster_id: cluster_id.to_string(),
            step_id: failed.id.clone(),
            state: failed.state.to_string(),
        });
    }

    for step in &progress.steps {
        tracing::debug!(step_id = %step.id, step = %step.name, state = %step.state, "Step state");
    }
    tracing::info!(
        cluster_id = %cluster_id,
        completed = progress.completed,
        submitted = batch.len(),
        "Waiting for steps"
    );
    Ok(PollDecision::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCluster;
    use std::time::Duration;

    const URI: &str = "s3://scripts/pyspark_quick_setup.sh";

    #[test]
    fn setup_steps_copy_then_run() {
        let steps = setup_steps(URI, "pyspark_quick_setup.sh", "ip-1.ec2.internal");

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "setup - copy files");
        assert_eq!(
            steps[0].args,
            vec!["aws", "s3", "cp", URI, "/home/hadoop/"]
        );
        assert_eq!(steps[1].name, "setup pyspark with conda");
        assert_eq!(
            steps[1].args,
            vec![
                "sudo",
                "bash",
                "/home/hadoop/pyspark_quick_setup.sh",
                "ip-1.ec2.internal"
            ]
        );
        for step in &steps {
            assert_eq!(step.jar, COMMAND_RUNNER_JAR);
            assert_eq!(step.action_on_failure, ActionOnFailure::CancelAndWait);
        }
    }

    #[tokio::test]
    async fn submitter_sends_exactly_two_steps() {
        let mock = Arc::new(MockCluster::new("j-1"));
        let submitter = StepSubmitter::new(mock.clone(), URI, "pyspark_quick_setup.sh", Span::none());

        let batch = submitter.submit("j-1", "ip-1.ec2.internal").await.unwrap();

        assert_eq!(batch.step_ids, vec!["s-1".to_string(), "s-2".to_string()]);
        let submitted = mock.submitted_steps();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0], submitter.steps("ip-1.ec2.internal"));
    }

    fn batch() -> StepBatchHandle {
        StepBatchHandle {
            step_ids: vec!["s-1".into(), "s-2".into()],
        }
    }

    async fn submitted_mock() -> Arc<MockCluster> {
        let mock = Arc::new(MockCluster::new("j-1"));
        mock.add_steps("j-1", &setup_steps(URI, "setup.sh", "dns"))
            .await
            .unwrap();
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn done_only_when_every_step_completed() {
        let mock = submitted_mock().await;
        mock.push_step_states(&[StepState::Running, StepState::Pending]);
        mock.push_step_states(&[StepState::Completed, StepState::Running]);
        mock.push_step_states(&[StepState::Completed, StepState::Completed]);
        let poller = StepPoller::new(
            mock.clone(),
            PollPolicy::every(Duration::from_secs(10)),
            Span::none(),
        );

        poller
            .wait("j-1", &batch(), &mut Shutdown::never())
            .await
            .unwrap();

        let completed_queries = mock
            .list_filters()
            .iter()
            .filter(|f| f.as_slice() == [StepState::Completed])
            .count();
        assert_eq!(completed_queries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_stops_the_poll() {
        let mock = submitted_mock().await;
        mock.push_step_states(&[StepState::Completed, StepState::Running]);
        mock.push_step_states(&[StepState::Completed, StepState::Failed]);
        let poller = StepPoller::new(
            mock.clone(),
            PollPolicy::every(Duration::from_secs(10)),
            Span::none(),
        );

        let err = poller
            .wait("j-1", &batch(), &mut Shutdown::never())
            .await
            .unwrap_err();

        match err {
            LoaderError::StepFailed { step_id, state, .. } => {
                assert_eq!(step_id, "s-2");
                assert_eq!(state, "FAILED");
            }
            other => panic!("expected StepFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_immediately_done() {
        let mock = Arc::new(MockCluster::new("j-1"));
        let poller = StepPoller::new(mock.clone(), PollPolicy::default(), Span::none());

        poller
            .wait("j-1", &StepBatchHandle { step_ids: vec![] }, &mut Shutdown::never())
            .await
            .unwrap();
    }
}
