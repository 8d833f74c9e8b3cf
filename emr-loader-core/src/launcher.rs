//! Cluster creation.

use crate::error::LoaderResult;
use crate::model::{ClusterHandle, ClusterSpec};
use crate::provider::ClusterProvider;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Issues the create-cluster request.
#[derive(Clone)]
pub struct ClusterLauncher {
    provider: Arc<dyn ClusterProvider>,
    span: Span,
}

impl ClusterLauncher {
    /// Create a launcher logging into `span`.
    pub fn new(provider: Arc<dyn ClusterProvider>, span: Span) -> Self {
        Self { provider, span }
    }

    /// Send exactly one create request for `spec`.
    ///
    /// The returned handle has no master DNS name yet. Service errors are
    /// returned as-is; nothing is retried.
    pub async fn launch(&self, spec: &ClusterSpec) -> LoaderResult<ClusterHandle> {
        self.create(spec).instrument(self.span.clone()).await
    }

    async fn create(&self, spec: &ClusterSpec) -> LoaderResult<ClusterHandle> {
        tracing::info!(
            name = %spec.name,
            instance_count = spec.instance_count,
            master_instance_type = %spec.master_instance_type,
            slave_instance_type = %spec.slave_instance_type,
            release_label = %spec.release_label,
            bootstrap = %spec.bootstrap_action.script_uri,
            "Creating cluster"
        );

        let cluster_id = self.provider.create_cluster(spec).await?;

        tracing::info!(cluster_id = %cluster_id, "Cluster creation requested");
        Ok(ClusterHandle::launched(cluster_id))
    }
}
