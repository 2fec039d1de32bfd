//! Error types for the load pipeline
//!
//! Every failure is fatal to the run. Variants carry enough context to tell
//! an operator which statement or which checkpoint stopped the pipeline.

use thiserror::Error;

use crate::quality::{CheckFailure, Checkpoint};
use crate::query::QueryRole;
use crate::warehouse::WarehouseError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum EtlError {
    /// Settings file missing, unreadable or incomplete
    #[error("Configuration error: {0}. Check the settings file and DWH_* environment overrides.")]
    Config(String),

    /// Static table registry is inconsistent (unknown dependency, cycle, missing query)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The warehouse connection could not be opened
    #[error("Failed to connect to warehouse: {0}")]
    Connect(#[source] WarehouseError),

    /// A drop, create, copy or insert statement failed
    #[error("{role} statement for table '{table}' failed: {source}")]
    Statement {
        role: QueryRole,
        table: String,
        #[source]
        source: WarehouseError,
    },

    /// A quality probe could not be executed
    #[error("Quality probe '{probe}' could not be executed: {source}")]
    Probe {
        probe: String,
        #[source]
        source: WarehouseError,
    },

    /// At least one quality check did not return its expected value
    #[error("Data quality checks FAILED at {checkpoint} checkpoint: {} failing check(s)", .failures.len())]
    QualityCheckFailed {
        checkpoint: Checkpoint,
        failures: Vec<CheckFailure>,
    },

    /// The warehouse connection did not close cleanly
    #[error("Failed to close warehouse connection: {0}")]
    Close(#[source] WarehouseError),

    /// Object storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] dwh_common::DwhError),
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether this error was raised by a quality gate rather than by the warehouse
    pub fn is_quality_failure(&self) -> bool {
        matches!(self, Self::QualityCheckFailed { .. })
    }
}

impl From<config::ConfigError> for EtlError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
