//! Waiting for a launched cluster to accept steps.

use crate::error::{LoaderError, LoaderResult};
use crate::model::{ClusterDescription, ClusterHandle};
use crate::poll::{PollDecision, PollPolicy, Shutdown, poll};
use crate::provider::{ClusterProvider, ProviderError};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Final state of the readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The cluster is `WAITING` and its master DNS name is known.
    Ready,
    /// The cluster terminated; no steps can run.
    Terminated,
}

/// Polls describe-cluster until the cluster is ready or gone.
#[derive(Clone)]
pub struct StatusPoller {
    provider: Arc<dyn ClusterProvider>,
    policy: PollPolicy,
    span: Span,
}

impl StatusPoller {
    /// Create a poller logging into `span`.
    pub fn new(provider: Arc<dyn ClusterProvider>, policy: PollPolicy, span: Span) -> Self {
        Self {
            provider,
            policy,
            span,
        }
    }

    /// Poll until the cluster reaches `WAITING` or a terminated state.
    ///
    /// `handle` is updated from every fetched description; its master DNS
    /// name is latched the first time one is reported.
    pub async fn wait(
        &self,
        handle: &mut ClusterHandle,
        shutdown: &mut Shutdown,
    ) -> LoaderResult<Readiness> {
        let cluster_id = handle.id.clone();
        let id = cluster_id.as_str();
        let provider = self.provider.as_ref();

        poll(
            "cluster readiness",
            &self.policy,
            shutdown,
            move || async move {
                provider
                    .describe_cluster(id)
                    .await
                    .map_err(LoaderError::from)
            },
            |description| classify(handle, description),
        )
        .instrument(self.span.clone())
        .await
    }
}

fn classify(
    handle: &mut ClusterHandle,
    description: ClusterDescription,
) -> LoaderResult<PollDecision<Readiness>> {
    if handle.observe(description) {
        tracing::info!(
            cluster_id = %handle.id,
            master_dns = handle.master_dns.as_deref().unwrap_or_default(),
            "Master DNS assigned"
        );
    }

    let reason = handle.reason.as_deref().unwrap_or("");

    if handle.state.is_ready() {
        if handle.master_dns.is_none() {
            return Err(LoaderError::Provider(ProviderError::InvalidResponse {
                operation: "DescribeCluster",
                message: format!("cluster {} is WAITING without a master DNS name", handle.id),
            }));
        }
        tracing::info!(cluster_id = %handle.id, state = %handle.state, reason, "Cluster is ready");
        return Ok(PollDecision::Done(Readiness::Ready));
    }

    if handle.state.is_terminal() {
        tracing::warn!(
            cluster_id = %handle.id,
            state = %handle.state,
            reason,
            "Cluster stopped, cannot run steps"
        );
        return Ok(PollDecision::Done(Readiness::Terminated));
    }

    tracing::info!(
        cluster_id = %handle.id,
        state = %handle.state,
        reason,
        master_dns = handle.master_dns.as_deref().unwrap_or_default(),
        "Cluster not ready yet"
    );
    Ok(PollDecision::Continue)
}
