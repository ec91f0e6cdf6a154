use anyhow::Result;
use clap::{Parser, ValueEnum};
use litmr::{ArtifactFormat, Collaborators, EngineConfig, Pipeline, PipelineOptions, StageKind, StageSpec};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    /// `bookId,year<TAB>score` from the sentiment stage
    Scores,
    /// `bookId,year,lemma<TAB>count` from the wordfreq stage
    WordCounts,
    /// `bookId,year,lemma,count`
    Flat,
}

impl From<InputFormat> for ArtifactFormat {
    fn from(f: InputFormat) -> Self {
        match f {
            InputFormat::Scores => ArtifactFormat::BookScores,
            InputFormat::WordCounts => ArtifactFormat::WordCounts,
            InputFormat::Flat => ArtifactFormat::WordCountsFlat,
        }
    }
}

/// Sums sentiment scores and word frequencies per decade.
#[derive(Parser, Debug)]
struct Args {
    /// Sentiment or word-frequency artifact
    input: PathBuf,
    /// Output directory
    output: PathBuf,
    #[arg(long, value_enum, default_value = "scores")]
    format: InputFormat,
    /// Further artifacts, as `format=path` with format one of scores, word-counts, flat
    #[arg(long = "also", value_parser = parse_extra)]
    also: Vec<(InputFormat, PathBuf)>,
}

fn parse_extra(s: &str) -> Result<(InputFormat, PathBuf), String> {
    let (format, path) = s.split_once('=').ok_or_else(|| format!("expected format=path, got '{}'", s))?;
    Ok((InputFormat::from_str(format, true)?, PathBuf::from(path)))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::from_env();

    let mut stage = StageSpec::new("trends", StageKind::Trends, &args.output).reads_external(&args.input, args.format.into());
    for (format, path) in args.also {
        stage = stage.reads_external(path, format.into());
    }
    let report = Pipeline::new().stage(stage).run(&config, &Collaborators::default(), PipelineOptions::default())?;
    info!(stages = report.stages.len(), output = %args.output.display(), "trends done");
    Ok(())
}
