//! In-memory [`ClusterProvider`].

use crate::model::{ClusterDescription, ClusterSpec, StepSpec, StepState, StepSummary};
use crate::provider::{ClusterProvider, ProviderError, ProviderFuture};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Mock cluster control plane with scripted responses.
///
/// Describe-cluster answers come from a queue; once it is drained the last
/// answer repeats. Step listings work the same way, with one snapshot of
/// step states per completed-steps query. Unfiltered listings observe the
/// current snapshot without advancing it.
pub struct MockCluster {
    cluster_id: String,
    state: Mutex<MockClusterState>,
}

#[derive(Default)]
struct MockClusterState {
    create_requests: Vec<ClusterSpec>,
    create_error: Option<ProviderError>,
    descriptions: VecDeque<ClusterDescription>,
    last_description: Option<ClusterDescription>,
    describe_calls: usize,
    submitted: Vec<Vec<StepSpec>>,
    step_ids: Vec<String>,
    snapshots: VecDeque<Vec<StepState>>,
    current_snapshot: Option<Vec<StepState>>,
    list_filters: Vec<Vec<StepState>>,
}

impl MockCluster {
    /// Create a mock that hands out `cluster_id` on creation.
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            state: Mutex::new(MockClusterState::default()),
        }
    }

    /// Queue a describe-cluster answer.
    pub fn push_description(&self, state: &str, master_dns: Option<&str>, reason: Option<&str>) {
        self.state.lock().descriptions.push_back(ClusterDescription {
            id: self.cluster_id.clone(),
            state: state.into(),
            reason: reason.map(str::to_string),
            master_public_dns: master_dns.map(str::to_string),
        });
    }

    /// Builder form of [`push_description`](Self::push_description).
    pub fn with_description(self, state: &str, master_dns: Option<&str>) -> Self {
        self.push_description(state, master_dns, None);
        self
    }

    /// Queue the states of the submitted steps, in submission order.
    pub fn push_step_states(&self, states: &[StepState]) {
        self.state.lock().snapshots.push_back(states.to_vec());
    }

    /// Builder form of [`push_step_states`](Self::push_step_states).
    pub fn with_step_states(self, states: &[StepState]) -> Self {
        self.push_step_states(states);
        self
    }

    /// Make the next create-cluster call fail.
    pub fn fail_create(&self, error: ProviderError) {
        self.state.lock().create_error = Some(error);
    }

    /// Every create-cluster request received.
    pub fn create_requests(&self) -> Vec<ClusterSpec> {
        self.state.lock().create_requests.clone()
    }

    /// Every batch of steps received.
    pub fn submitted_steps(&self) -> Vec<Vec<StepSpec>> {
        self.state.lock().submitted.clone()
    }

    /// Number of describe-cluster calls.
    pub fn describe_calls(&self) -> usize {
        self.state.lock().describe_calls
    }

    /// State filters of every list-steps call.
    pub fn list_filters(&self) -> Vec<Vec<StepState>> {
        self.state.lock().list_filters.clone()
    }
}

impl ClusterProvider for MockCluster {
    fn create_cluster<'a>(&'a self, spec: &'a ClusterSpec) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.create_requests.push(spec.clone());
            match state.create_error.take() {
                Some(err) => Err(err),
                None => Ok(self.cluster_id.clone()),
            }
        })
    }

    fn describe_cluster<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> ProviderFuture<'a, ClusterDescription> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.describe_calls += 1;

            if cluster_id != self.cluster_id {
                return Err(ProviderError::NotFound {
                    resource: format!("cluster {}", cluster_id),
                });
            }

            if let Some(next) = state.descriptions.pop_front() {
                state.last_description = Some(next);
            }
            state
                .last_description
                .clone()
                .ok_or_else(|| ProviderError::Service {
                    operation: "DescribeCluster",
                    message: "no scripted description".to_string(),
                })
        })
    }

    fn add_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        steps: &'a [StepSpec],
    ) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if cluster_id != self.cluster_id {
                return Err(ProviderError::NotFound {
                    resource: format!("cluster {}", cluster_id),
                });
            }

            state.submitted.push(steps.to_vec());
            let first = state.step_ids.len() + 1;
            let ids: Vec<String> = (first..first + steps.len())
                .map(|n| format!("s-{}", n))
                .collect();
            state.step_ids.extend(ids.iter().cloned());
            Ok(ids)
        })
    }

    fn list_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        states: &'a [StepState],
    ) -> ProviderFuture<'a, Vec<StepSummary>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.list_filters.push(states.to_vec());

            if cluster_id != self.cluster_id {
                return Err(ProviderError::NotFound {
                    resource: format!("cluster {}", cluster_id),
                });
            }

            if states.contains(&StepState::Completed) {
                if let Some(next) = state.snapshots.pop_front() {
                    state.current_snapshot = Some(next);
                }
            }

            let snapshot = state
                .current_snapshot
                .clone()
                .unwrap_or_else(|| vec![StepState::Completed; state.step_ids.len()]);

            Ok(state
                .step_ids
                .iter()
                .zip(snapshot)
                .enumerate()
                .map(|(index, (id, step_state))| StepSummary {
                    id: id.clone(),
                    name: format!("step {}", index + 1),
                    state: step_state,
                })
                .filter(|summary| states.is_empty() || states.contains(&summary.state))
                .collect())
        })
    }
}
