//! Quality gate tests against an in-memory warehouse

mod common;

use anyhow::Result;
use common::RecordingWarehouse;
use dwh_etl::quality::{Observed, QualityCheck};
use dwh_etl::{Checkpoint, EtlError, QualityGate, Scalar};

fn checks() -> Vec<QualityCheck> {
    vec![
        QualityCheck::row_count("i94addrl", 55),
        QualityCheck::row_count("i94cntyl", 289),
        QualityCheck::no_nulls("airport_codes", "ident"),
    ]
}

#[tokio::test]
async fn test_all_checks_pass() -> Result<()> {
    let checks = checks();
    let mut warehouse = RecordingWarehouse::passing_all(&checks);

    let report = QualityGate::run_checks(Checkpoint::Staging, &checks, &mut warehouse).await?;

    assert!(report.is_success());
    assert_eq!(report.passed.len(), 3);
    assert_eq!(warehouse.probed.len(), 3);
    assert!(report.into_result().is_ok());
    Ok(())
}

#[tokio::test]
async fn test_mismatches_are_collected_in_order() -> Result<()> {
    let checks = checks();
    let mut warehouse = RecordingWarehouse::passing_all(&checks)
        .answer("public.i94addrl", 54_i64)
        .answer("WHERE ident IS NULL", 12_i64);

    let report = QualityGate::run_checks(Checkpoint::Final, &checks, &mut warehouse).await?;

    // Every probe runs even after the first mismatch
    assert_eq!(warehouse.probed.len(), 3);
    assert_eq!(report.passed.len(), 1);
    assert_eq!(report.passed[0].probe, "SELECT COUNT(*) FROM public.i94cntyl");

    let probes: Vec<&str> = report.failed.iter().map(|f| f.probe.as_str()).collect();
    assert_eq!(
        probes,
        vec![
            "SELECT COUNT(*) FROM public.i94addrl",
            "SELECT COUNT(*) FROM public.airport_codes WHERE ident IS NULL",
        ]
    );
    assert_eq!(report.failed[1].observed, Observed::Value(Scalar::Int(12)));

    let rendered = report.to_string();
    assert!(rendered.starts_with("PASSED QUALITY CHECKS:\n"));
    assert!(rendered.contains("FAILED QUALITY CHECKS:\n  SELECT COUNT(*) FROM public.i94addrl (expected 55, got 54)"));

    let err = report.into_result().unwrap_err();
    assert!(err.is_quality_failure());
    assert!(err.to_string().contains("final checkpoint"));
    Ok(())
}

#[tokio::test]
async fn test_empty_result_is_a_failure() -> Result<()> {
    let checks = checks();
    let mut warehouse = RecordingWarehouse::passing_all(&checks).no_rows("public.i94cntyl");

    let report = QualityGate::run_checks(Checkpoint::Staging, &checks, &mut warehouse).await?;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].observed, Observed::NoRows);
    assert!(report.to_string().contains("(expected 289, got no rows)"));
    Ok(())
}

#[tokio::test]
async fn test_float_result_matches_integer_expectation() -> Result<()> {
    let checks = vec![QualityCheck::new("SELECT ROUND(AVG(visit_count)) FROM public.v", 7_i64)];
    let mut warehouse = RecordingWarehouse::new().answer("AVG(visit_count)", Scalar::Float(7.0));

    let report = QualityGate::run_checks(Checkpoint::Final, &checks, &mut warehouse).await?;

    assert!(report.is_success());
    Ok(())
}

#[tokio::test]
async fn test_null_result_fails_a_zero_expectation() -> Result<()> {
    let checks = vec![QualityCheck::no_nulls("airport_codes", "ident")];
    let mut warehouse = RecordingWarehouse::new().answer("ident IS NULL", Scalar::Null);

    let report = QualityGate::run_checks(Checkpoint::Final, &checks, &mut warehouse).await?;

    assert_eq!(report.failed[0].observed, Observed::Value(Scalar::Null));
    Ok(())
}

#[tokio::test]
async fn test_probe_error_stops_the_checkpoint() {
    let checks = checks();
    let mut warehouse = RecordingWarehouse::passing_all(&checks).failing_on("public.i94cntyl");

    let err = QualityGate::run_checks(Checkpoint::Staging, &checks, &mut warehouse)
        .await
        .unwrap_err();

    match err {
        EtlError::Probe { probe, .. } => assert_eq!(probe, "SELECT COUNT(*) FROM public.i94cntyl"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(warehouse.probed.len(), 1);
}

#[tokio::test]
async fn test_no_checks_pass_trivially() -> Result<()> {
    let mut warehouse = RecordingWarehouse::new();
    let report = QualityGate::run_checks(Checkpoint::Staging, &[], &mut warehouse).await?;

    assert!(report.is_success());
    assert!(warehouse.probed.is_empty());
    Ok(())
}
