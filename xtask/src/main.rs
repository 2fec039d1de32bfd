//! Build automation tasks for the DWH ETL
//!
//! - Generating CLI documentation from source code
//! - Writing a settings template for new environments

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the DWH ETL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate CLI documentation in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },

    /// Write a settings template with every section and key
    GenerateConfig {
        /// File to write
        #[arg(short, long, default_value = "dwh.cfg.example")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
        Command::GenerateConfig { output, force } => generate_config(&output, force)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<dwh_etl::Cli>();

    let content = format!(
        r#"# dwh-etl CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

`dwh-etl` rebuilds the I-94 immigration warehouse in one batch: it drops and
recreates every table, bulk-copies the raw files from the bucket into staging
tables, checks row counts, transforms staging rows into the target tables and
checks the result. Any failure stops the run.

## Quick Start

```bash
# Stage the raw files into the bucket
dwh-etl upload --data-dir data

# Inspect every statement a run will issue
dwh-etl plan

# Run the full load
dwh-etl run

# Re-run the final checks after a manual fix
dwh-etl check final
```

## Commands

{}

## Configuration

Settings are read from `dwh.cfg` (override with `--config` or `DWH_CONFIG`).
Every key can also be set from the environment as `DWH_<SECTION>__<KEY>`.
Run `cargo xtask generate-config` for a template.

## Environment Variables

- `DWH_CONFIG` - Settings file (default: `dwh.cfg`)
- `LOG_LEVEL` - Logging level (`trace`, `debug`, `info`, `warn`, `error`)
- `LOG_OUTPUT` - `console`, `file` or `both`
- `LOG_FORMAT` - `text` or `json`
- `LOG_DIR` - Directory for rolling log files

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}

fn generate_config(output: &str, force: bool) -> anyhow::Result<()> {
    let path = PathBuf::from(output);
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }

    let template = format!(
        r#"[CLUSTER]
HOST =
DB_NAME =
DB_USER =
DB_PASSWORD =
DB_PORT = {port}
# disable, prefer or require
SSL_MODE = prefer
CONNECT_TIMEOUT_SECS = {timeout}

[IAM_ROLE]
ARN =

[S3]
BUCKET =
REGION = {region}
# ENDPOINT = http://localhost:9000

# Static keys for `dwh-etl upload`; the default AWS chain is used when absent
# [AWS]
# KEY =
# SECRET =
"#,
        port = dwh_etl::config::DEFAULT_DB_PORT,
        timeout = dwh_etl::config::DEFAULT_CONNECT_TIMEOUT_SECS,
        region = dwh_etl::config::DEFAULT_S3_REGION,
    );

    fs::write(&path, template)?;
    println!("✅ Wrote settings template to: {}", path.display());

    Ok(())
}
