//! Run command - provision the cluster described by a configuration file.

use anyhow::{Context, Result};
use emr_loader_core::{LoaderConfig, OrchestrationOutcome, Orchestrator, Plan, Shutdown};
use std::path::Path;

/// Run the run command.
pub async fn run(path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let config = LoaderConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    tracing::info!(
        file = %path.display(),
        dry_run,
        cluster_name = %config.emr.cluster_name,
        "Loaded configuration"
    );

    if dry_run {
        return print_plan(&config, json);
    }

    let (trigger, mut shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping before the next request");
            trigger.trigger();
        }
    });

    let orchestrator = Orchestrator::from_aws(&config.emr).await.with_span(tracing::info_span!(
        "emr_loader",
        cluster_name = %config.emr.cluster_name,
        region = %config.emr.region_name,
        cluster_id = tracing::field::Empty,
    ));
    let report = orchestrator
        .run(&config, &mut shutdown)
        .await
        .context("Provisioning run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report.outcome {
        OrchestrationOutcome::Completed { cluster, steps } => {
            println!("✓ Cluster {} is ready", cluster.id);
            println!(
                "  Master DNS: {}",
                cluster.master_dns.as_deref().unwrap_or_default()
            );
            println!("  Steps:      {}", steps.step_ids.join(", "));
        }
        OrchestrationOutcome::ClusterTerminated { cluster } => {
            println!("⚠ Cluster {} stopped in state {}", cluster.id, cluster.state);
            if let Some(reason) = &cluster.reason {
                println!("  Reason: {}", reason);
            }
        }
    }
    println!(
        "  Elapsed:    {}s",
        (report.finished_at - report.started_at).num_seconds()
    );

    Ok(())
}

fn print_plan(config: &LoaderConfig, json: bool) -> Result<()> {
    let plan = Plan::from_config(&config.emr)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("Dry run, nothing is sent to AWS.");
        println!();
        print!("{}", serde_yaml::to_string(&plan)?);
    }

    Ok(())
}
