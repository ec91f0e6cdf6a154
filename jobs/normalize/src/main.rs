use anyhow::Result;
use clap::Parser;
use litmr::{run_stage, Collaborators, EngineConfig, StageKind};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Normalizes a book catalog into `bookId,year<TAB>title` records.
#[derive(Parser, Debug)]
struct Args {
    /// Catalog file or directory of `bookId,bookName,publicationYear` lines
    input: PathBuf,
    /// Output directory
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();
    let report = run_stage(StageKind::Normalize, "normalize", &[args.input], &args.output, &config, &Collaborators::default())?;
    info!(groups = report.reduce.total_groups, skipped = report.map.skipped.total(), "normalize done");
    Ok(())
}
