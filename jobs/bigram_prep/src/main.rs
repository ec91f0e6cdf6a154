use anyhow::Result;
use clap::Parser;
use litmr::{run_stage, Collaborators, EngineConfig, StageKind};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Regroups word counts into one lemma line per book and year.
#[derive(Parser, Debug)]
struct Args {
    /// Word-frequency artifact
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
    let report = run_stage(StageKind::BigramPrep, "bigram_prep", &[args.input], &args.output, &config, &Collaborators::default())?;
    info!(groups = report.reduce.total_groups, skipped = report.map.skipped.total(), "bigram_prep done");
    Ok(())
}
