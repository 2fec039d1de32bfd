//! Command implementations
//!
//! Each subcommand lives in its own module. Console output (stage markers and
//! check reports) goes to stdout; diagnostics go through `tracing`.

pub mod check;
pub mod plan;
pub mod run;
pub mod upload;

use colored::Colorize;
use uuid::Uuid;

use crate::pipeline::{PipelineObserver, PipelineState};
use crate::quality::CheckReport;

/// Prints the stage markers of a run
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn started(&mut self, run_id: Uuid) {
        println!("{} {}", "Begin ETL:".cyan().bold(), run_id.to_string().dimmed());
    }

    fn stage_completed(&mut self, state: PipelineState) {
        match state.step() {
            Some(step) => println!("\n{}...{}", step, "COMPLETE".green().bold()),
            None if state == PipelineState::End => println!("\n{}\n", "End of ETL".cyan().bold()),
            None => {},
        }
    }

    fn checks_reported(&mut self, report: &CheckReport) {
        println!();
        print_report(report);
    }
}

/// Passed checks, then failed checks with expected and observed values
pub fn print_report(report: &CheckReport) {
    if !report.passed.is_empty() {
        println!("{}", "PASSED QUALITY CHECKS:".green().bold());
        for check in &report.passed {
            println!("  {} = {}", check.probe, check.observed);
        }
    }

    if !report.failed.is_empty() {
        println!("{}", "FAILED QUALITY CHECKS:".red().bold());
        for failure in &report.failed {
            println!("  {}", failure.to_string().red());
        }
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
