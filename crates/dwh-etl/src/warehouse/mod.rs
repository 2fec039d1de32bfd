//! Warehouse connection seam
//!
//! Components never talk to sqlx directly. They issue statements through the
//! [`Warehouse`] trait, which lets the catalog, executors and quality gate be
//! exercised against a recording fake in tests.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod postgres;

pub use postgres::PgWarehouse;

/// Errors raised by a warehouse connection
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// A probe returned a column type the gate cannot compare
    #[error("Unsupported result value: {0}")]
    Decode(String),

    /// The connection could not be established in time
    #[error("Connection attempt timed out after {0}s")]
    Timeout(u64),

    /// The connection was already closed
    #[error("Warehouse connection is closed")]
    Closed,
}

/// Single scalar value returned by a probe or used as an expected result
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Value equality with integer/float cross comparison
    ///
    /// `COUNT(*)` comes back as `INT8` while `AVG` or `ROUND` may come back as
    /// a float; both compare equal to an integer expectation of the same value.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Int(a), Scalar::Float(b)) | (Scalar::Float(b), Scalar::Int(a)) => {
                (*a as f64) == *b
            },
            _ => self == other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// An exclusive connection to the warehouse for one pipeline run
#[async_trait]
pub trait Warehouse: Send {
    /// Execute one statement in its own transaction and commit it
    ///
    /// Returns the number of rows affected as reported by the engine.
    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError>;

    /// First column of the first row, or `None` when the query returns no rows
    async fn fetch_scalar(&mut self, sql: &str) -> Result<Option<Scalar>, WarehouseError>;

    /// Release the connection. Called exactly once per run.
    async fn close(&mut self) -> Result<(), WarehouseError>;
}
