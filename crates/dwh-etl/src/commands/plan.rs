//! `dwh-etl plan` command implementation
//!
//! Renders every statement of a run with the current settings. Nothing is
//! sent to the warehouse.

use colored::Colorize;
use std::path::Path;

use crate::config::EtlConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;

pub fn run(config_path: &Path) -> Result<()> {
    let config = EtlConfig::load(config_path)?;
    let pipeline = Pipeline::standard()?;

    for step in pipeline.plan(&config) {
        let name = step.reaches.step().unwrap_or_else(|| step.reaches.as_str());
        println!("{} {}", "--".dimmed(), name.cyan().bold());
        println!();

        for statement in &step.statements {
            let statement = statement.trim_end();
            if statement.ends_with(';') {
                println!("{}", statement);
            } else {
                println!("{};", statement);
            }
            println!();
        }
    }

    Ok(())
}
