use anyhow::Result;
use clap::Parser;
use litmr::constants::{DEFAULT_LEXICON, ENV_LEXICON};
use litmr::{run_stage, Collaborators, EngineConfig, Lexicon, StageKind};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scores each book and year against a sentiment lexicon.
#[derive(Parser, Debug)]
struct Args {
    /// Word-frequency artifact
    input: PathBuf,
    /// Output directory
    output: PathBuf,
    /// `word<TAB>score` lexicon
    #[arg(long, env = ENV_LEXICON, default_value = DEFAULT_LEXICON)]
    lexicon: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();
    let collaborators = Collaborators::default().with_lexicon(Lexicon::load(&args.lexicon)?);
    let report = run_stage(StageKind::Sentiment, "sentiment", &[args.input], &args.output, &config, &collaborators)?;
    info!(
        groups = report.reduce.total_groups,
        lexicon_miss = report.map.skipped.lexicon_miss,
        skipped = report.map.skipped.total(),
        "sentiment done"
    );
    Ok(())
}
