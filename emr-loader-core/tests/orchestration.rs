//! End-to-end runs against the in-memory providers.

mod common;

use common::Fixture;
use emr_loader_core::model::{ClusterState, StepState};
use emr_loader_core::provider::{ProviderError, ProviderFuture, StorageProvider};
use emr_loader_core::testing::{MockCluster, MockStorage, StorageCall};
use emr_loader_core::{LoaderError, OrchestrationOutcome, Orchestrator, Shutdown, ShutdownTrigger};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DNS: &str = "ip-10-0-0-1.eu-west-1.compute.internal";

fn orchestrator(cluster: &Arc<MockCluster>, storage: &Arc<MockStorage>) -> Orchestrator {
    Orchestrator::new(cluster.clone(), storage.clone())
}

#[tokio::test(start_paused = true)]
async fn test_full_run_sets_up_the_cluster() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(
        MockCluster::new("j-ABC")
            .with_description("STARTING", None)
            .with_description("BOOTSTRAPPING", Some(DNS))
            .with_description("WAITING", Some(DNS))
            .with_step_states(&[StepState::Running, StepState::Pending])
            .with_step_states(&[StepState::Completed, StepState::Completed]),
    );
    let storage = Arc::new(MockStorage::new());

    let report = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap();

    let OrchestrationOutcome::Completed { cluster: handle, steps } = &report.outcome else {
        panic!("expected completion, got {:?}", report.outcome);
    };
    assert_eq!(handle.id, "j-ABC");
    assert_eq!(handle.master_dns.as_deref(), Some(DNS));
    assert_eq!(handle.state, ClusterState::Waiting);
    assert_eq!(steps.len(), 2);
    assert!(report.finished_at >= report.started_at);

    let requests = cluster.create_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instance_count, 3);
    assert_eq!(requests[0].key_name.as_deref(), Some("k1"));
    assert_eq!(requests[0].subnet_id.as_deref(), Some("subnet-1"));
    assert_eq!(
        requests[0].bootstrap_action.script_uri,
        "s3://scripts/bootstrap_actions.sh"
    );

    let submitted = cluster.submitted_steps();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].len(), 2);
    assert_eq!(
        submitted[0][0].args,
        vec![
            "aws",
            "s3",
            "cp",
            "s3://scripts/pyspark_quick_setup.sh",
            "/home/hadoop/"
        ]
    );
    assert_eq!(submitted[0][1].args.last().map(String::as_str), Some(DNS));
}

#[tokio::test(start_paused = true)]
async fn test_missing_bucket_is_created_before_uploads() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC").with_description("WAITING", Some(DNS)));
    let storage = Arc::new(MockStorage::new());

    orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap();

    let calls = storage.calls();
    assert_eq!(calls[0], StorageCall::HeadBucket("scripts".into()));
    assert_eq!(calls[1], StorageCall::CreateBucket("scripts".into()));
    assert_eq!(
        calls[2],
        StorageCall::Upload {
            path: fixture.bootstrap.clone(),
            bucket: "scripts".into(),
            key: "bootstrap_actions.sh".into(),
        }
    );
    assert_eq!(
        calls[3],
        StorageCall::Upload {
            path: fixture.setup.clone(),
            bucket: "scripts".into(),
            key: "pyspark_quick_setup.sh".into(),
        }
    );
    assert_eq!(
        storage.object("scripts", "pyspark_quick_setup.sh").unwrap(),
        b"#!/bin/bash\necho setup \"$1\"\n".to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn test_terminated_cluster_skips_steps() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC"));
    cluster.push_description("STARTING", None, None);
    cluster.push_description("TERMINATED_WITH_ERRORS", None, Some("Bootstrap failure"));
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let report = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap();

    let OrchestrationOutcome::ClusterTerminated { cluster: handle } = &report.outcome else {
        panic!("expected termination, got {:?}", report.outcome);
    };
    assert_eq!(handle.state, ClusterState::TerminatedWithErrors);
    assert_eq!(handle.reason.as_deref(), Some("Bootstrap failure"));
    assert!(cluster.submitted_steps().is_empty());
    assert!(cluster.list_filters().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_step_fails_the_run() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(
        MockCluster::new("j-ABC")
            .with_description("WAITING", Some(DNS))
            .with_step_states(&[StepState::Cancelled, StepState::Cancelled]),
    );
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let err = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::StepFailed { ref step_id, .. } if step_id == "s-1"));
}

#[tokio::test(start_paused = true)]
async fn test_create_error_stops_before_polling() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC"));
    cluster.fail_create(ProviderError::Service {
        operation: "RunJobFlow",
        message: "ValidationException: invalid instance type".into(),
    });
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let err = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Provider(ProviderError::Service { .. })));
    assert_eq!(cluster.describe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_script_stops_before_launch() {
    let fixture = Fixture::new("");
    std::fs::remove_file(&fixture.setup).unwrap();
    let cluster = Arc::new(MockCluster::new("j-ABC"));
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let err = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Asset { .. }));
    assert!(cluster.create_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_status_polls_are_ten_seconds_apart() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(
        MockCluster::new("j-ABC")
            .with_description("STARTING", None)
            .with_description("STARTING", None)
            .with_description("WAITING", Some(DNS)),
    );
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let started = tokio::time::Instant::now();
    orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap();

    assert_eq!(cluster.describe_calls(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(20), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(21), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_from_config() {
    let fixture = Fixture::new("  poll:\n    interval_secs: 5\n    timeout_secs: 30\n");
    let cluster = Arc::new(MockCluster::new("j-ABC").with_description("STARTING", None));
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let err = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::PollTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_the_status_poll() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC").with_description("STARTING", None));
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));
    let (trigger, mut shutdown) = Shutdown::channel();

    let orchestrator = orchestrator(&cluster, &storage);
    let config = fixture.config();
    let run = orchestrator.run(&config, &mut shutdown);
    tokio::pin!(run);

    tokio::select! {
        _ = &mut run => panic!("run finished while the cluster was starting"),
        _ = tokio::time::sleep(Duration::from_secs(35)) => trigger.trigger(),
    }
    let err = run.await.unwrap_err();

    assert!(matches!(err, LoaderError::Cancelled { .. }));
    assert_eq!(cluster.describe_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_run_sends_nothing() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC").with_description("WAITING", Some(DNS)));
    let storage = Arc::new(MockStorage::new());
    let (trigger, mut shutdown) = Shutdown::channel();
    trigger.trigger();

    let err = orchestrator(&cluster, &storage)
        .run(&fixture.config(), &mut shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Cancelled { ref what } if what == "script upload"));
    assert!(storage.calls().is_empty());
    assert!(cluster.create_requests().is_empty());
}

/// Storage that requests shutdown while a script is being uploaded.
struct InterruptingStorage {
    inner: MockStorage,
    trigger: ShutdownTrigger,
}

impl StorageProvider for InterruptingStorage {
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        self.inner.head_bucket(bucket)
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str) -> ProviderFuture<'a, ()> {
        self.inner.create_bucket(bucket)
    }

    fn upload_file<'a>(
        &'a self,
        path: &'a Path,
        bucket: &'a str,
        key: &'a str,
    ) -> ProviderFuture<'a, ()> {
        self.trigger.trigger();
        self.inner.upload_file(path, bucket, key)
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_upload_skips_cluster_creation() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(MockCluster::new("j-ABC").with_description("WAITING", Some(DNS)));
    let (trigger, mut shutdown) = Shutdown::channel();
    let storage = Arc::new(InterruptingStorage {
        inner: MockStorage::new().with_bucket("scripts"),
        trigger,
    });

    let err = Orchestrator::new(cluster.clone(), storage.clone())
        .run(&fixture.config(), &mut shutdown)
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::Cancelled { ref what } if what == "cluster creation"));
    assert!(storage.inner.has_bucket("scripts"));
    assert!(storage.inner.object("scripts", "pyspark_quick_setup.sh").is_some());
    assert!(cluster.create_requests().is_empty());
    assert_eq!(cluster.describe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_steps_use_the_first_reported_dns() {
    let fixture = Fixture::new("");
    let cluster = Arc::new(
        MockCluster::new("j-ABC")
            .with_description("BOOTSTRAPPING", Some("dns-a.ec2.internal"))
            .with_description("WAITING", Some("dns-b.ec2.internal")),
    );
    let storage = Arc::new(MockStorage::new().with_bucket("scripts"));

    let report = Orchestrator::new(cluster.clone(), storage.clone())
        .with_span(tracing::info_span!("provisioning", cluster_id = tracing::field::Empty))
        .run(&fixture.config(), &mut Shutdown::never())
        .await
        .unwrap();

    assert_eq!(
        report.outcome.cluster().master_dns.as_deref(),
        Some("dns-a.ec2.internal")
    );
    let submitted = cluster.submitted_steps();
    assert_eq!(
        submitted[0][1].args.last().map(String::as_str),
        Some("dns-a.ec2.internal")
    );
}
