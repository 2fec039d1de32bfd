//! `dwh-etl check` command implementation
//!
//! Runs one checkpoint against whatever the warehouse currently holds, e.g.
//! to re-validate after a manual fix.

use std::path::Path;
use tracing::warn;

use super::print_report;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::quality::{Checkpoint, QualityGate};
use crate::warehouse::{PgWarehouse, Warehouse};

pub async fn run(config_path: &Path, checkpoint: Checkpoint) -> Result<()> {
    let config = EtlConfig::load(config_path)?;

    let mut warehouse = PgWarehouse::connect(&config.cluster)
        .await
        .map_err(EtlError::Connect)?;

    let outcome = QualityGate::run_checks(checkpoint, &checkpoint.checks(), &mut warehouse).await;
    let closed = warehouse.close().await;

    let report = match (outcome, closed) {
        (Ok(report), Ok(())) => report,
        (Ok(_), Err(source)) => return Err(EtlError::Close(source)),
        (Err(err), closed) => {
            if let Err(source) = closed {
                warn!(error = %source, "Warehouse connection did not close");
            }
            return Err(err);
        },
    };

    print_report(&report);
    report.into_result().map(|_| ())
}
