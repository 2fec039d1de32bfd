//! DWH ETL Library
//!
//! Batch load of the I-94 immigration warehouse: raw files in object storage
//! are bulk-copied into staging tables, validated, transformed into typed
//! target tables and validated again.
//!
//! # Overview
//!
//! - **Schema Catalog**: table inventory, DDL and insert dependencies ([`catalog`])
//! - **Load Executor**: COPY from object storage into staging tables ([`load`])
//! - **Transform Executor**: `INSERT ... SELECT` with cleansing rules ([`transform`])
//! - **Quality Gate**: probe queries compared with expected values ([`quality`])
//! - **Pipeline Orchestrator**: the run state machine ([`pipeline`])
//! - **Uploader**: stages local source files into the bucket ([`storage`])

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod load;
pub mod pipeline;
pub mod quality;
pub mod query;
pub mod storage;
pub mod transform;
pub mod warehouse;

// Re-export commonly used types
pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use pipeline::{Pipeline, PipelineObserver, PipelineState};
pub use quality::{CheckReport, Checkpoint, QualityGate};
pub use warehouse::{PgWarehouse, Scalar, Warehouse, WarehouseError};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DWH ETL - load the I-94 immigration warehouse
#[derive(Parser, Debug)]
#[command(name = "dwh-etl")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file with the [CLUSTER], [IAM_ROLE] and [S3] sections
    #[arg(
        short,
        long,
        env = "DWH_CONFIG",
        default_value = config::DEFAULT_CONFIG_FILE,
        global = true
    )]
    pub config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drop, create, load, check, transform and check the warehouse
    Run,

    /// Print every statement a run would issue, without connecting
    Plan,

    /// Run one checkpoint's quality checks against the current tables
    Check {
        /// Which set of checks to run
        #[arg(value_enum)]
        checkpoint: Checkpoint,
    },

    /// Upload local source files to the bucket read by the COPY statements
    Upload {
        /// Directory holding the raw/ and lookup/ folders
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// List the uploads without sending anything
        #[arg(long)]
        dry_run: bool,
    },
}
