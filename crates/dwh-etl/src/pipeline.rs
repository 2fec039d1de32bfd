//! Pipeline Orchestrator
//!
//! Drives one run through a fixed sequence of states, one component call per
//! transition:
//!
//! ```text
//! Start -> DropsComplete -> CreatesComplete -> StagingComplete
//!       -> StagingChecksPassed -> InsertsComplete -> FinalChecksPassed -> End
//! ```
//!
//! The first error ends the run in the state it was raised from. The warehouse
//! connection is closed on every path, success or abort.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::load::{standard_copies, CopySpec, LoadExecutor};
use crate::quality::{CheckReport, Checkpoint, QualityCheck, QualityGate};
use crate::transform::{standard_plans, InsertPlan, TransformExecutor};
use crate::warehouse::Warehouse;

/// Progress of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineState {
    Start,
    DropsComplete,
    CreatesComplete,
    StagingComplete,
    StagingChecksPassed,
    InsertsComplete,
    FinalChecksPassed,
    End,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::DropsComplete => "drops_complete",
            PipelineState::CreatesComplete => "creates_complete",
            PipelineState::StagingComplete => "staging_complete",
            PipelineState::StagingChecksPassed => "staging_checks_passed",
            PipelineState::InsertsComplete => "inserts_complete",
            PipelineState::FinalChecksPassed => "final_checks_passed",
            PipelineState::End => "end",
        }
    }

    /// The only state reachable from this one
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Start => Some(PipelineState::DropsComplete),
            PipelineState::DropsComplete => Some(PipelineState::CreatesComplete),
            PipelineState::CreatesComplete => Some(PipelineState::StagingComplete),
            PipelineState::StagingComplete => Some(PipelineState::StagingChecksPassed),
            PipelineState::StagingChecksPassed => Some(PipelineState::InsertsComplete),
            PipelineState::InsertsComplete => Some(PipelineState::FinalChecksPassed),
            PipelineState::FinalChecksPassed => Some(PipelineState::End),
            PipelineState::End => None,
        }
    }

    /// Name of the step that completes on entering this state
    pub fn step(&self) -> Option<&'static str> {
        match self {
            PipelineState::Start | PipelineState::End => None,
            PipelineState::DropsComplete => Some("drop_tables"),
            PipelineState::CreatesComplete => Some("create_tables"),
            PipelineState::StagingComplete => Some("load_staging_tables"),
            PipelineState::StagingChecksPassed => Some("staging_quality_checks"),
            PipelineState::InsertsComplete => Some("insert_tables"),
            PipelineState::FinalChecksPassed => Some("insert_quality_checks"),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress of a run, e.g. to print stage markers
pub trait PipelineObserver: Send {
    fn started(&mut self, _run_id: Uuid) {}

    fn stage_completed(&mut self, _state: PipelineState) {}

    /// Called with every report, before a failing report aborts the run
    fn checks_reported(&mut self, _report: &CheckReport) {}
}

/// Observer that ignores all progress
#[derive(Debug, Default)]
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub staging_report: CheckReport,
    pub final_report: CheckReport,
    pub duration: Duration,
}

/// Statements one transition would issue, for dry runs
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub reaches: PipelineState,
    pub statements: Vec<String>,
}

/// The whole load: schema, sources, inserts and both checkpoints
#[derive(Debug, Clone)]
pub struct Pipeline {
    catalog: Catalog,
    loader: LoadExecutor,
    transformer: TransformExecutor,
    staging_checks: Vec<QualityCheck>,
    final_checks: Vec<QualityCheck>,
}

impl Pipeline {
    /// Assemble a pipeline, validating the catalog before anything runs
    pub fn new(
        catalog: Catalog,
        copies: Vec<CopySpec>,
        plans: Vec<InsertPlan>,
        staging_checks: Vec<QualityCheck>,
        final_checks: Vec<QualityCheck>,
    ) -> Result<Self> {
        catalog.validate()?;
        let loader = LoadExecutor::new(&catalog, copies)?;
        let transformer = TransformExecutor::new(&catalog, plans)?;

        Ok(Self {
            catalog,
            loader,
            transformer,
            staging_checks,
            final_checks,
        })
    }

    /// The immigration warehouse load
    pub fn standard() -> Result<Self> {
        Self::new(
            Catalog::standard(),
            standard_copies(),
            standard_plans(),
            Checkpoint::Staging.checks(),
            Checkpoint::Final.checks(),
        )
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn loader(&self) -> &LoadExecutor {
        &self.loader
    }

    pub fn transformer(&self) -> &TransformExecutor {
        &self.transformer
    }

    pub fn checks(&self, checkpoint: Checkpoint) -> &[QualityCheck] {
        match checkpoint {
            Checkpoint::Staging => &self.staging_checks,
            Checkpoint::Final => &self.final_checks,
        }
    }

    /// Every statement of a run, grouped by the state it leads to
    pub fn plan(&self, config: &EtlConfig) -> Vec<PlannedStep> {
        let render = |queries: &crate::query::QueryList| -> Vec<String> {
            queries.iter().map(|q| q.sql(config)).collect()
        };
        let probes = |checks: &[QualityCheck]| -> Vec<String> {
            checks.iter().map(|c| c.probe.clone()).collect()
        };

        vec![
            PlannedStep {
                reaches: PipelineState::DropsComplete,
                statements: render(&self.catalog.drop_queries()),
            },
            PlannedStep {
                reaches: PipelineState::CreatesComplete,
                statements: render(&self.catalog.create_queries()),
            },
            PlannedStep {
                reaches: PipelineState::StagingComplete,
                statements: render(self.loader.queries()),
            },
            PlannedStep {
                reaches: PipelineState::StagingChecksPassed,
                statements: probes(&self.staging_checks),
            },
            PlannedStep {
                reaches: PipelineState::InsertsComplete,
                statements: render(self.transformer.queries()),
            },
            PlannedStep {
                reaches: PipelineState::FinalChecksPassed,
                statements: probes(&self.final_checks),
            },
        ]
    }

    /// Run every stage against `warehouse`, then close it
    ///
    /// The connection is closed exactly once whatever the outcome. When a
    /// stage fails and closing fails too, the stage error is returned and the
    /// close error is logged.
    pub async fn run<W>(
        &self,
        config: &EtlConfig,
        warehouse: &mut W,
        observer: &mut dyn PipelineObserver,
    ) -> Result<PipelineRun>
    where
        W: Warehouse + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id);

        async move {
            let started = Instant::now();
            info!("Begin ETL");
            observer.started(run_id);

            let mut state = PipelineState::Start;
            let outcome = self.drive(config, warehouse, observer, &mut state).await;
            let closed = warehouse.close().await;

            match (outcome, closed) {
                (Ok((staging_report, final_report)), Ok(())) => {
                    advance(&mut state, observer);
                    let duration = started.elapsed();
                    info!(state = %state, duration_ms = duration.as_millis() as u64, "End of ETL");
                    Ok(PipelineRun {
                        run_id,
                        staging_report,
                        final_report,
                        duration,
                    })
                },
                (Ok(_), Err(source)) => {
                    error!(state = %state, error = %source, "Warehouse connection did not close");
                    Err(EtlError::Close(source))
                },
                (Err(err), closed) => {
                    if let Err(source) = closed {
                        warn!(error = %source, "Warehouse connection did not close after abort");
                    }
                    error!(state = %state, error = %err, "Pipeline aborted");
                    Err(err)
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn drive<W>(
        &self,
        config: &EtlConfig,
        warehouse: &mut W,
        observer: &mut dyn PipelineObserver,
        state: &mut PipelineState,
    ) -> Result<(CheckReport, CheckReport)>
    where
        W: Warehouse + ?Sized,
    {
        self.catalog.drop_all(warehouse, config).await?;
        advance(state, observer);

        self.catalog.create_all(warehouse, config).await?;
        advance(state, observer);

        self.loader.stage_all(warehouse, config).await?;
        advance(state, observer);

        let staging_report = self.gate(Checkpoint::Staging, warehouse, observer).await?;
        advance(state, observer);

        self.transformer.insert_all(warehouse, config).await?;
        advance(state, observer);

        let final_report = self.gate(Checkpoint::Final, warehouse, observer).await?;
        advance(state, observer);

        Ok((staging_report, final_report))
    }

    async fn gate<W>(
        &self,
        checkpoint: Checkpoint,
        warehouse: &mut W,
        observer: &mut dyn PipelineObserver,
    ) -> Result<CheckReport>
    where
        W: Warehouse + ?Sized,
    {
        let report = QualityGate::run_checks(checkpoint, self.checks(checkpoint), warehouse).await?;
        observer.checks_reported(&report);
        report.into_result()
    }
}

fn advance(state: &mut PipelineState, observer: &mut dyn PipelineObserver) {
    if let Some(next) = state.next() {
        *state = next;
        info!(state = %next, "Stage complete");
        observer.stage_completed(next);
    }
}
