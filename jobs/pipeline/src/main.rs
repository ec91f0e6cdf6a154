use anyhow::Result;
use clap::Parser;
use litmr::constants::{DEFAULT_LEXICON, ENV_LEMMAS, ENV_LEXICON};
use litmr::{Collaborators, EngineConfig, Lexicon, Pipeline, PipelineOptions, StageStatus, TableLemmatizer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs the whole chain: normalize, wordfreq, sentiment, bigram_prep, bigrams and trends.
#[derive(Parser, Debug)]
struct Args {
    /// Catalog of `bookId,bookName,publicationYear` lines
    input: PathBuf,
    /// Root directory; each stage writes a subdirectory
    output: PathBuf,
    #[arg(long, env = ENV_LEXICON, default_value = DEFAULT_LEXICON)]
    lexicon: PathBuf,
    #[arg(long, env = ENV_LEMMAS)]
    lemmas: Option<PathBuf>,
    /// Keep stage outputs that are already committed
    #[arg(long)]
    resume: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();

    let mut collaborators = Collaborators::default().with_lexicon(Lexicon::load(&args.lexicon)?);
    if let Some(path) = &args.lemmas {
        collaborators = collaborators.with_lemmatizer(TableLemmatizer::load(path)?);
    }

    let pipeline = Pipeline::standard(&args.input, &args.output);
    pipeline.validate(&collaborators)?;
    let report = pipeline.run(&config, &collaborators, PipelineOptions { resume: args.resume })?;
    for stage in &report.stages {
        match &stage.status {
            StageStatus::Ran(r) => info!(stage = %stage.name, output = %stage.output.display(), groups = r.reduce.total_groups,
                                        skipped = r.map.skipped.total(), "stage ran"),
            StageStatus::Reused => info!(stage = %stage.name, output = %stage.output.display(), "stage reused"),
        }
    }
    Ok(())
}
