use anyhow::Result;
use clap::{Parser, ValueEnum};
use litmr::{ArtifactFormat, Collaborators, EngineConfig, Pipeline, PipelineOptions, StageKind, StageSpec};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    /// `bookId,year<TAB>text`, as written by bigram_prep or normalize
    BookText,
    /// Plain text lines
    Text,
}

/// Counts adjacent word pairs.
#[derive(Parser, Debug)]
struct Args {
    /// Text artifact
    input: PathBuf,
    /// Output directory
    output: PathBuf,
    #[arg(long, value_enum, default_value = "book-text")]
    format: InputFormat,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();
    let format = match args.format {
        InputFormat::BookText => ArtifactFormat::BookText,
        InputFormat::Text => ArtifactFormat::FreeText,
    };
    Pipeline::new()
        .stage(StageSpec::new("bigrams", StageKind::Bigrams, &args.output).reads_external(&args.input, format))
        .run(&config, &Collaborators::default(), PipelineOptions::default())?;
    info!(output = %args.output.display(), "bigrams done");
    Ok(())
}
