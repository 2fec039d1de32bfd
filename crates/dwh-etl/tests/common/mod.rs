//! Common test utilities for dwh-etl integration tests
//!
//! [`RecordingWarehouse`] stands in for a live cluster: it records every
//! statement it is given, answers probes from a script and can be told to
//! fail any statement containing a given fragment.

#![allow(dead_code)]

use async_trait::async_trait;
use dwh_etl::config::{ClusterConfig, EtlConfig, IamRoleConfig, S3Config, SslMode};
use dwh_etl::{Scalar, Warehouse, WarehouseError};

/// Bucket used by [`test_config`]
pub const TEST_BUCKET: &str = "capstone";

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dwh_etl=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Settings pointing at nothing; the fake warehouse never connects
pub fn test_config() -> EtlConfig {
    EtlConfig {
        cluster: ClusterConfig {
            host: "localhost".to_string(),
            db_name: "dwh".to_string(),
            db_user: "etl".to_string(),
            db_password: "secret".to_string(),
            db_port: 5439,
            ssl_mode: SslMode::Disable,
            connect_timeout_secs: 5,
        },
        iam_role: IamRoleConfig {
            arn: "arn:aws:iam::123456789012:role/dwhRole".to_string(),
        },
        s3: S3Config {
            bucket: TEST_BUCKET.to_string(),
            region: "us-west-2".to_string(),
            endpoint: None,
        },
        aws: None,
    }
}

/// Scripted answer to a probe
#[derive(Debug, Clone)]
enum Answer {
    Value(Scalar),
    NoRows,
}

/// In-memory warehouse that records what it is asked to do
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    /// Statements passed to `execute`, in order
    pub executed: Vec<String>,
    /// Probes passed to `fetch_scalar`, in order
    pub probed: Vec<String>,
    /// Number of `close` calls
    pub closes: usize,
    answers: Vec<(String, Answer)>,
    failing: Vec<String>,
    fail_close: bool,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every probe with the expected value of its check
    pub fn passing_all(checks: &[dwh_etl::quality::QualityCheck]) -> Self {
        let mut warehouse = Self::new();
        for check in checks {
            warehouse = warehouse.answer(&check.probe, check.expected.clone());
        }
        warehouse
    }

    /// Answer probes containing `fragment` with `value`
    ///
    /// Later answers take precedence over earlier ones.
    pub fn answer(mut self, fragment: &str, value: impl Into<Scalar>) -> Self {
        self.answers.insert(0, (fragment.to_string(), Answer::Value(value.into())));
        self
    }

    /// Probes containing `fragment` return an empty result set
    pub fn no_rows(mut self, fragment: &str) -> Self {
        self.answers.insert(0, (fragment.to_string(), Answer::NoRows));
        self
    }

    /// Fail any statement or probe containing `fragment`
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Make `close` report an error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Executed statements starting with `prefix`
    pub fn executed_with(&self, prefix: &str) -> Vec<&str> {
        self.executed
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    fn check_failure(&self, sql: &str) -> Result<(), WarehouseError> {
        if self.closes > 0 {
            return Err(WarehouseError::Closed);
        }
        match self.failing.iter().find(|f| sql.contains(f.as_str())) {
            Some(fragment) => Err(WarehouseError::Sqlx(sqlx::Error::Protocol(format!(
                "injected failure on '{}'",
                fragment
            )))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError> {
        self.check_failure(sql)?;
        self.executed.push(sql.to_string());
        Ok(0)
    }

    async fn fetch_scalar(&mut self, sql: &str) -> Result<Option<Scalar>, WarehouseError> {
        self.check_failure(sql)?;
        self.probed.push(sql.to_string());

        let answer = self
            .answers
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, answer)| answer.clone());

        Ok(match answer {
            Some(Answer::Value(value)) => Some(value),
            Some(Answer::NoRows) => None,
            None => Some(Scalar::Int(0)),
        })
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        self.closes += 1;
        if self.fail_close {
            return Err(WarehouseError::Closed);
        }
        Ok(())
    }
}
