//! The analysis stages: what each one reads, what it writes, and which
//! emitter/reduction pair it runs on the engine.

use crate::api::ExecutablePipeline;
use crate::config::EngineConfig;
use crate::emitters::{BigramEmitter, BigramPrepEmitter, DecadeEmitter, FrequencyEmitter, SentimentEmitter};
use crate::error::Error;
use crate::lemma::{IdentityLemmatizer, Lemmatizer};
use crate::lexicon::Lexicon;
use crate::normalize::RecordNormalizer;
use crate::reduce::{JoinReducer, SumReducer};
use crate::runtime::RuntimePipeline;
use crate::stats::StageReport;
use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Textual contract of a stage artifact, one record per line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// `bookId,bookName,publicationYear`
    Catalog,
    /// `bookId,year<TAB>text`
    BookText,
    /// One line of free text.
    FreeText,
    /// `bookId,year,lemma<TAB>count`
    WordCounts,
    /// `bookId,year,lemma,count`
    WordCountsFlat,
    /// `bookId,year<TAB>totalScore`
    BookScores,
    /// `bigram<TAB>count`
    BigramCounts,
    /// `<Label>_Decade_<decade><TAB>sum`
    DecadeTrends,
}

/// Rewrites one line into another format; `None` drops the line.
pub type Reserializer = fn(&str) -> Option<String>;

fn book_text_to_free_text(line: &str) -> Option<String> {
    line.split_once('\t').map(|(_, text)| text.to_string())
}

fn word_counts_to_flat(line: &str) -> Option<String> {
    line.split_once('\t').map(|(key, count)| format!("{},{}", key, count))
}

impl ArtifactFormat {
    /// The line rewrite from `self` into `target`, if the two are bridgeable.
    pub fn reserializer(self, target: ArtifactFormat) -> Option<Reserializer> {
        match (self, target) {
            (ArtifactFormat::BookText, ArtifactFormat::FreeText) => Some(book_text_to_free_text as Reserializer),
            (ArtifactFormat::WordCounts, ArtifactFormat::WordCountsFlat) => Some(word_counts_to_flat as Reserializer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Normalize,
    WordFrequency,
    BigramPrep,
    Bigrams,
    Sentiment,
    Trends,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Normalize => "normalize",
            StageKind::WordFrequency => "wordfreq",
            StageKind::BigramPrep => "bigram_prep",
            StageKind::Bigrams => "bigrams",
            StageKind::Sentiment => "sentiment",
            StageKind::Trends => "trends",
        }
    }

    /// Formats the stage's emitter reads without any rewriting.
    pub fn accepts(self) -> &'static [ArtifactFormat] {
        match self {
            StageKind::Normalize => &[ArtifactFormat::Catalog],
            StageKind::WordFrequency => &[ArtifactFormat::BookText],
            StageKind::BigramPrep => &[ArtifactFormat::WordCounts],
            StageKind::Bigrams => &[ArtifactFormat::FreeText],
            StageKind::Sentiment => &[ArtifactFormat::WordCounts],
            StageKind::Trends => &[ArtifactFormat::BookScores, ArtifactFormat::WordCountsFlat],
        }
    }

    pub fn produces(self) -> ArtifactFormat {
        match self {
            StageKind::Normalize => ArtifactFormat::BookText,
            StageKind::WordFrequency => ArtifactFormat::WordCounts,
            StageKind::BigramPrep => ArtifactFormat::BookText,
            StageKind::Bigrams => ArtifactFormat::BigramCounts,
            StageKind::Sentiment => ArtifactFormat::BookScores,
            StageKind::Trends => ArtifactFormat::DecadeTrends,
        }
    }

    /// How an input of `format` reaches this stage: `Ok(None)` when read as is,
    /// `Ok(Some(rewrite))` when it must be re-serialised first.
    pub fn handoff(self, format: ArtifactFormat) -> Result<Option<Reserializer>, Error> {
        if self.accepts().contains(&format) {
            return Ok(None);
        }
        self.accepts()
            .iter()
            .find_map(|&target| format.reserializer(target))
            .map(Some)
            .ok_or_else(|| Error::Pipeline(format!("stage kind {} cannot read {:?} artifacts", self, format)))
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for StageKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Error> {
        [
            StageKind::Normalize,
            StageKind::WordFrequency,
            StageKind::BigramPrep,
            StageKind::Bigrams,
            StageKind::Sentiment,
            StageKind::Trends,
        ]
        .into_iter()
        .find(|k| k.as_str() == s)
        .ok_or_else(|| Error::Configuration(format!("unknown stage kind '{}'", s)))
    }
}

/// Read-only collaborators handed to emitters at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub lemmatizer: Arc<dyn Lemmatizer>,
    pub lexicon: Option<Arc<Lexicon>>,
}

impl Collaborators {
    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = Some(Arc::new(lexicon));
        self
    }

    pub fn with_lemmatizer(mut self, lemmatizer: impl Lemmatizer + 'static) -> Self {
        self.lemmatizer = Arc::new(lemmatizer);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self { Self { lemmatizer: Arc::new(IdentityLemmatizer), lexicon: None } }
}

/// Runs one stage over already-compatible inputs.
pub fn run_stage(kind: StageKind, name: &str, inputs: &[PathBuf], output: &Path, config: &EngineConfig, collaborators: &Collaborators) -> Result<StageReport> {
    let mut p = RuntimePipeline::new(config.clone()).named(name);
    for input in inputs {
        p.add_input(input);
    }
    p.add_output(output);
    match kind {
        StageKind::Normalize => p.map_reduce(RecordNormalizer, JoinReducer::default()),
        StageKind::WordFrequency => p.map_reduce(FrequencyEmitter::new(Arc::clone(&collaborators.lemmatizer)), SumReducer),
        StageKind::BigramPrep => p.map_reduce(BigramPrepEmitter, JoinReducer::default()),
        StageKind::Bigrams => p.map_reduce(BigramEmitter, SumReducer),
        StageKind::Sentiment => {
            let lexicon = collaborators
                .lexicon
                .clone()
                .ok_or_else(|| Error::Configuration("sentiment stage requires a lexicon".into()))?;
            p.map_reduce(SentimentEmitter::new(lexicon), SumReducer)
        }
        StageKind::Trends => p.map_reduce(DecadeEmitter, SumReducer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_upstream_output_reaches_its_consumers() {
        assert!(StageKind::WordFrequency.handoff(StageKind::Normalize.produces()).unwrap().is_none());
        assert!(StageKind::Sentiment.handoff(StageKind::WordFrequency.produces()).unwrap().is_none());
        assert!(StageKind::Trends.handoff(StageKind::Sentiment.produces()).unwrap().is_none());
        assert!(StageKind::Trends.handoff(StageKind::WordFrequency.produces()).unwrap().is_some());
        assert!(StageKind::Bigrams.handoff(StageKind::BigramPrep.produces()).unwrap().is_some());
        assert!(StageKind::Sentiment.handoff(ArtifactFormat::Catalog).is_err());
    }

    #[test]
    fn reserializers_match_downstream_contracts() {
        let flat = ArtifactFormat::WordCounts.reserializer(ArtifactFormat::WordCountsFlat).unwrap();
        assert_eq!(flat("1,1885,cut\t2").as_deref(), Some("1,1885,cut,2"));
        assert_eq!(flat("no tab"), None);
        let text = ArtifactFormat::BookText.reserializer(ArtifactFormat::FreeText).unwrap();
        assert_eq!(text("1,1885\tcut during").as_deref(), Some("cut during"));
    }

    #[test]
    fn stage_kinds_parse_from_their_names() {
        for kind in [StageKind::Normalize, StageKind::Bigrams, StageKind::Trends] {
            assert_eq!(kind.as_str().parse::<StageKind>().unwrap(), kind);
        }
        assert!("nope".parse::<StageKind>().is_err());
    }

    #[test]
    fn sentiment_without_lexicon_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        std::fs::write(&input, "1,1885,cut\t1\n").unwrap();
        let cfg = EngineConfig::local().with_work_dir(dir.path().join("work"));
        let err = run_stage(StageKind::Sentiment, "sentiment", &[input], &dir.path().join("out"), &cfg, &Collaborators::default()).unwrap_err();
        assert!(err.to_string().contains("lexicon"));
    }
}
