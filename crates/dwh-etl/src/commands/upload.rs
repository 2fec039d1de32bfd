//! `dwh-etl upload` command implementation
//!
//! Stages local source files into the bucket layout the COPY statements
//! read from.

use colored::Colorize;
use std::path::Path;

use super::format_bytes;
use crate::config::EtlConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::storage::{plan_uploads, S3Uploader};

pub async fn run(config_path: &Path, data_dir: &Path, dry_run: bool) -> Result<()> {
    let config = EtlConfig::load(config_path)?;
    let pipeline = Pipeline::standard()?;

    let items = plan_uploads(data_dir, pipeline.loader().specs())?;

    if dry_run {
        println!("{}", "Planned uploads:".cyan().bold());
        for item in &items {
            println!(
                "  {} -> s3://{}/{}",
                item.local.display(),
                config.s3.bucket,
                item.key
            );
        }
        println!();
        println!("  Total files: {}", items.len());
        return Ok(());
    }

    let uploader = S3Uploader::new(&config).await;
    let results = uploader.upload_all(&items).await?;

    println!("{}", "Uploaded:".cyan().bold());
    for result in &results {
        println!(
            "  {} s3://{}/{} ({}, sha256 {})",
            "✓".green(),
            uploader.bucket(),
            result.key,
            format_bytes(result.size),
            &result.checksum[..16]
        );
    }

    let total: u64 = results.iter().map(|r| r.size).sum();
    println!();
    println!("  Total files: {}", results.len());
    println!("  Total size:  {}", format_bytes(total));

    Ok(())
}
