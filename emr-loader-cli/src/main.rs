//! emr-loader CLI - provision an EMR cluster from a YAML file.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use emr_loader_core::observability::{TracingConfig, TracingGuard, init_tracing};
use std::path::PathBuf;

/// emr-loader - create an EMR cluster, upload its scripts and run setup steps.
#[derive(Parser)]
#[command(name = "emr-loader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a cluster and run its setup steps
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.yml")]
        config: PathBuf,

        /// Print what would be sent without calling AWS
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.yml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

fn setup_logging(verbosity: u8) -> Result<TracingGuard> {
    let filter = match verbosity {
        0 => "info,aws_config=warn,aws_smithy_runtime=warn",
        1 => "debug,aws_config=info,aws_smithy_runtime=info",
        _ => "trace",
    };

    // Environment wins over -v
    let mut config = TracingConfig::from_env();
    if std::env::var_os("EMR_LOADER_LOG_LEVEL").is_none() && std::env::var_os("RUST_LOG").is_none()
    {
        config = TracingConfig::builder()
            .log_format(config.log_format())
            .include_location(config.include_location())
            .ansi(config.ansi())
            .log_filter(filter)
            .build();
    }

    init_tracing(&config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            json,
        } => commands::run::run(&config, dry_run, json).await,
        Commands::Validate { config } => commands::validate::run(&config),
        Commands::Version => commands::version::run(),
    }
}
