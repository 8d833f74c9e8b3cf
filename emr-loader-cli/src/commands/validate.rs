//! Validate command - check a configuration file without calling AWS.

use anyhow::Result;
use emr_loader_core::{LoaderConfig, LoaderError, Plan};
use std::path::Path;

/// Run the validate command.
pub fn run(path: &Path) -> Result<()> {
    tracing::info!(file = %path.display(), "Validating configuration");

    println!("Validation Results for: {}", path.display());
    println!();

    let config = match LoaderConfig::from_file(path) {
        Ok(config) => config,
        Err(LoaderError::InvalidConfig(errors)) => {
            println!("✗ Configuration is invalid:");
            for error in &errors {
                println!("  - {}", error);
            }
            anyhow::bail!("Configuration validation failed");
        }
        Err(e) => {
            println!("✗ {}", e);
            anyhow::bail!("Configuration could not be loaded");
        }
    };
    println!("✓ Configuration is valid");

    let plan = Plan::from_config(&config.emr)?;
    println!();
    println!("Cluster:  {} ({})", plan.cluster.name, plan.cluster.release_label);
    println!("Region:   {}", config.emr.region_name);
    println!(
        "Nodes:    {} x {} / {}",
        plan.cluster.instance_count,
        plan.cluster.master_instance_type,
        plan.cluster.slave_instance_type
    );

    let mut missing = 0;
    println!("Scripts:");
    for upload in &plan.uploads {
        let status = if upload.local_path.is_file() {
            "✓"
        } else {
            missing += 1;
            "✗"
        };
        println!(
            "  {} {} -> {}",
            status,
            upload.local_path.display(),
            upload.uri
        );
    }

    if missing > 0 {
        anyhow::bail!("{} script(s) not found", missing);
    }

    Ok(())
}
