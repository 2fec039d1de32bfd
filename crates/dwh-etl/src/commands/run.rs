//! `dwh-etl run` command implementation
//!
//! Connects to the warehouse and executes the full pipeline.

use std::path::Path;
use tracing::info;

use super::ConsoleObserver;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::pipeline::Pipeline;
use crate::warehouse::PgWarehouse;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = EtlConfig::load(config_path)?;
    let pipeline = Pipeline::standard()?;

    let mut warehouse = PgWarehouse::connect(&config.cluster)
        .await
        .map_err(EtlError::Connect)?;

    let run = pipeline
        .run(&config, &mut warehouse, &mut ConsoleObserver)
        .await?;

    info!(
        run_id = %run.run_id,
        duration_secs = run.duration.as_secs(),
        staging_checks = run.staging_report.passed.len(),
        final_checks = run.final_report.passed.len(),
        "ETL run finished"
    );

    Ok(())
}
