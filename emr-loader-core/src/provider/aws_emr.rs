//! EMR-backed [`ClusterProvider`].

use super::{ClusterProvider, ProviderError, ProviderFuture};
use crate::model::{ClusterDescription, ClusterSpec, StepSpec, StepState, StepSummary};
use aws_sdk_emr::Client;
use aws_sdk_emr::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_emr::types::{
    ActionOnFailure, Application, BootstrapActionConfig, HadoopJarStepConfig,
    JobFlowInstancesConfig, ScriptBootstrapActionConfig, StepConfig,
};

/// Cluster provider talking to the EMR API.
#[derive(Debug, Clone)]
pub struct AwsEmr {
    client: Client,
}

impl AwsEmr {
    /// Create a provider from shared AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    ProviderError::from_code(
        operation,
        code.as_deref(),
        DisplayErrorContext(&err).to_string(),
    )
}

fn step_config(step: &StepSpec) -> StepConfig {
    StepConfig::builder()
        .name(&step.name)
        .action_on_failure(ActionOnFailure::from(step.action_on_failure.as_str()))
        .hadoop_jar_step(
            HadoopJarStepConfig::builder()
                .jar(&step.jar)
                .set_args(Some(step.args.clone()))
                .build(),
        )
        .build()
}

impl ClusterProvider for AwsEmr {
    fn create_cluster<'a>(&'a self, spec: &'a ClusterSpec) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            const OP: &str = "RunJobFlow";

            let bootstrap = BootstrapActionConfig::builder()
                .name(&spec.bootstrap_action.name)
                .script_bootstrap_action(
                    ScriptBootstrapActionConfig::builder()
                        .path(&spec.bootstrap_action.script_uri)
                        .build(),
                )
                .build();

            let instances = JobFlowInstancesConfig::builder()
                .master_instance_type(&spec.master_instance_type)
                .slave_instance_type(&spec.slave_instance_type)
                .instance_count(spec.instance_count)
                .keep_job_flow_alive_when_no_steps(spec.keep_alive_when_no_steps)
                .termination_protected(spec.termination_protected)
                .set_ec2_key_name(spec.key_name.clone())
                .set_ec2_subnet_id(spec.subnet_id.clone())
                .build();

            let applications = spec
                .applications
                .iter()
                .map(|name| Application::builder().name(name).build())
                .collect::<Vec<_>>();

            let output = self
                .client
                .run_job_flow()
                .name(&spec.name)
                .set_log_uri(spec.log_uri.clone())
                .release_label(&spec.release_label)
                .instances(instances)
                .set_applications(Some(applications))
                .bootstrap_actions(bootstrap)
                .visible_to_all_users(spec.visible_to_all_users)
                .job_flow_role(&spec.job_flow_role)
                .service_role(&spec.service_role)
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            tracing::debug!(?output, "RunJobFlow response");

            output
                .job_flow_id()
                .map(str::to_string)
                .ok_or(ProviderError::InvalidResponse {
                    operation: OP,
                    message: "no JobFlowId in response".to_string(),
                })
        })
    }

    fn describe_cluster<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> ProviderFuture<'a, ClusterDescription> {
        Box::pin(async move {
            const OP: &str = "DescribeCluster";

            let output = self
                .client
                .describe_cluster()
                .cluster_id(cluster_id)
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            let cluster = output.cluster().ok_or(ProviderError::InvalidResponse {
                operation: OP,
                message: format!("no cluster in response for {}", cluster_id),
            })?;
            let status = cluster.status();

            Ok(ClusterDescription {
                id: cluster.id().unwrap_or(cluster_id).to_string(),
                state: status
                    .and_then(|s| s.state())
                    .map(|s| s.as_str().into())
                    .unwrap_or_else(|| "UNKNOWN".into()),
                reason: status
                    .and_then(|s| s.state_change_reason())
                    .and_then(|r| r.message())
                    .map(str::to_string),
                master_public_dns: cluster.master_public_dns_name().map(str::to_string),
            })
        })
    }

    fn add_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        steps: &'a [StepSpec],
    ) -> ProviderFuture<'a, Vec<String>> {
        Box::pin(async move {
            const OP: &str = "AddJobFlowSteps";

            let configs = steps.iter().map(step_config).collect::<Vec<_>>();

            let output = self
                .client
                .add_job_flow_steps()
                .job_flow_id(cluster_id)
                .set_steps(Some(configs))
                .send()
                .await
                .map_err(|e| sdk_error(OP, e))?;

            tracing::debug!(?output, "AddJobFlowSteps response");
            Ok(output.step_ids().to_vec())
        })
    }

    fn list_steps<'a>(
        &'a self,
        cluster_id: &'a str,
        states: &'a [StepState],
    ) -> ProviderFuture<'a, Vec<StepSummary>> {
        Box::pin(async move {
            const OP: &str = "ListSteps";

            let filter = (!states.is_empty()).then(|| {
                states
                    .iter()
                    .map(|s| aws_sdk_emr::types::StepState::from(s.as_str()))
                    .collect::<Vec<_>>()
            });

            let mut summaries = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let output = self
                    .client
                    .list_steps()
                    .cluster_id(cluster_id)
                    .set_step_states(filter.clone())
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| sdk_error(OP, e))?;

                summaries.extend(output.steps().iter().map(|step| {
                    StepSummary {
                        id: step.id().unwrap_or_default().to_string(),
                        name: step.name().unwrap_or_default().to_string(),
                        state: step
                            .status()
                            .and_then(|s| s.state())
                            .map(|s| s.as_str().into())
                            .unwrap_or_else(|| "UNKNOWN".into()),
                    }
                }));

                match output.marker() {
                    Some(next) => marker = Some(next.to_string()),
                    None => break,
                }
            }

            Ok(summaries)
        })
    }
}
