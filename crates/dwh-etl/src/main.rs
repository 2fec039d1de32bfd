//! DWH ETL - Main entry point

use anyhow::Context;
use clap::Parser;
use dwh_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use dwh_etl::{commands, Cli, Commands};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stage markers go to stdout; logs go to stderr and the log file
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(if cli.verbose {
            LogOutput::Both
        } else {
            LogOutput::File
        })
        .log_file_prefix("dwh-etl")
        .build();

    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid LOG_* settings: {}", e);
            log_config
        },
    };

    let log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        // Flush the non-blocking file writer before exiting
        drop(log_guard);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Run => commands::run::run(&cli.config)
            .await
            .context("ETL run failed"),

        Commands::Plan => commands::plan::run(&cli.config).context("Could not plan the run"),

        Commands::Check { checkpoint } => commands::check::run(&cli.config, *checkpoint)
            .await
            .with_context(|| format!("{} checks failed", checkpoint)),

        Commands::Upload { data_dir, dry_run } => {
            commands::upload::run(&cli.config, data_dir, *dry_run)
                .await
                .context("Upload failed")
        },
    }
}
