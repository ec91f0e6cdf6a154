use anyhow::Result;
use clap::Parser;
use litmr::constants::ENV_LEMMAS;
use litmr::{run_stage, Collaborators, EngineConfig, StageKind, TableLemmatizer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Counts lemma occurrences per book and year.
#[derive(Parser, Debug)]
struct Args {
    /// Normalized `bookId,year<TAB>text` artifact
    input: PathBuf,
    /// Output directory
    output: PathBuf,
    /// `word<TAB>lemma` table; words are counted as written when absent
    #[arg(long, env = ENV_LEMMAS)]
    lemmas: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();
    let mut collaborators = Collaborators::default();
    if let Some(path) = &args.lemmas {
        collaborators = collaborators.with_lemmatizer(TableLemmatizer::load(path)?);
    }
    let report = run_stage(StageKind::WordFrequency, "wordfreq", &[args.input], &args.output, &config, &collaborators)?;
    info!(groups = report.reduce.total_groups, skipped = report.map.skipped.total(), "wordfreq done");
    Ok(())
}
