//! Quality Gate
//!
//! A check is a probe query plus the value its first column of its first row
//! must equal. The gate runs every check of a checkpoint, partitions them into
//! passed and failed in input order and returns a [`CheckReport`]. The caller
//! decides whether to advance with [`CheckReport::into_result`].

use std::fmt;
use tracing::{error, info, instrument, warn};

use crate::error::{EtlError, Result};
use crate::warehouse::{Scalar, Warehouse};

mod checks;

pub use checks::{final_checks, staging_checks};

/// Where in the pipeline a set of checks runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Checkpoint {
    /// After the staging and lookup tables are loaded
    Staging,
    /// After the target tables are populated
    Final,
}

impl Checkpoint {
    pub fn checks(&self) -> Vec<QualityCheck> {
        match self {
            Checkpoint::Staging => staging_checks(),
            Checkpoint::Final => final_checks(),
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Staging => write!(f, "staging"),
            Checkpoint::Final => write!(f, "final"),
        }
    }
}

/// A probe and its expected value
#[derive(Debug, Clone, PartialEq)]
pub struct QualityCheck {
    pub probe: String,
    pub expected: Scalar,
}

impl QualityCheck {
    pub fn new(probe: impl Into<String>, expected: impl Into<Scalar>) -> Self {
        Self {
            probe: probe.into(),
            expected: expected.into(),
        }
    }

    /// `COUNT(*)` of a table must equal `expected`
    pub fn row_count(table: &str, expected: i64) -> Self {
        Self::new(format!("SELECT COUNT(*) FROM public.{}", table), expected)
    }

    /// No row of a table may have `column` NULL
    pub fn no_nulls(table: &str, column: &str) -> Self {
        Self::new(
            format!("SELECT COUNT(*) FROM public.{} WHERE {} IS NULL", table, column),
            0_i64,
        )
    }
}

/// What a probe returned
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Value(Scalar),
    /// The probe returned an empty result set
    NoRows,
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Value(value) => write!(f, "{}", value),
            Observed::NoRows => write!(f, "no rows"),
        }
    }
}

/// A check whose probe returned the expected value
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub probe: String,
    pub observed: Scalar,
}

/// A check whose probe did not return the expected value
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    pub probe: String,
    pub expected: Scalar,
    pub observed: Observed,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (expected {}, got {})",
            self.probe, self.expected, self.observed
        )
    }
}

/// Outcome of one checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub checkpoint: Checkpoint,
    pub passed: Vec<CheckResult>,
    pub failed: Vec<CheckFailure>,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// The report when every check passed, `QualityCheckFailed` otherwise
    pub fn into_result(self) -> Result<CheckReport> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(EtlError::QualityCheckFailed {
                checkpoint: self.checkpoint,
                failures: self.failed,
            })
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.passed.is_empty() {
            writeln!(f, "PASSED QUALITY CHECKS:")?;
            for check in &self.passed {
                writeln!(f, "  {} = {}", check.probe, check.observed)?;
            }
        }
        if !self.failed.is_empty() {
            writeln!(f, "FAILED QUALITY CHECKS:")?;
            for failure in &self.failed {
                writeln!(f, "  {}", failure)?;
            }
        }
        Ok(())
    }
}

/// Runs quality checks against the warehouse
pub struct QualityGate;

impl QualityGate {
    /// Execute each probe in order and compare it with its expected value
    ///
    /// A probe that fails to execute is a warehouse error and aborts the
    /// checkpoint. Mismatches, including empty results, are collected into the
    /// report; they never abort the remaining probes.
    #[instrument(skip(checks, warehouse), fields(checks = checks.len()))]
    pub async fn run_checks<W>(
        checkpoint: Checkpoint,
        checks: &[QualityCheck],
        warehouse: &mut W,
    ) -> Result<CheckReport>
    where
        W: Warehouse + ?Sized,
    {
        let mut report = CheckReport {
            checkpoint,
            passed: Vec::new(),
            failed: Vec::new(),
        };

        for check in checks {
            let observed = warehouse
                .fetch_scalar(&check.probe)
                .await
                .map_err(|source| EtlError::Probe {
                    probe: check.probe.clone(),
                    source,
                })?
                .map_or(Observed::NoRows, Observed::Value);

            match observed {
                Observed::Value(value) if value.matches(&check.expected) => {
                    info!(probe = %check.probe, observed = %value, "Quality check passed");
                    report.passed.push(CheckResult {
                        probe: check.probe.clone(),
                        observed: value,
                    });
                },
                observed => {
                    warn!(
                        probe = %check.probe,
                        expected = %check.expected,
                        observed = %observed,
                        "Quality check failed"
                    );
                    report.failed.push(CheckFailure {
                        probe: check.probe.clone(),
                        expected: check.expected.clone(),
                        observed,
                    });
                },
            }
        }

        if report.is_success() {
            info!(passed = report.passed.len(), "All quality checks passed");
        } else {
            error!(
                passed = report.passed.len(),
                failed = report.failed.len(),
                "Quality checks failed"
            );
        }

        Ok(report)
    }
}
