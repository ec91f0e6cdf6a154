//! Lemmatizer collaborators. The engine never lemmatizes by itself; stages are
//! handed one of these.

use crate::error::{Error, Result};
use crate::lexicon::read_tab_table;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

pub trait Lemmatizer: Send + Sync {
    fn lemma(&self, word: &str) -> String;
}

/// Returns every word unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityLemmatizer;

impl Lemmatizer for IdentityLemmatizer {
    fn lemma(&self, word: &str) -> String { word.to_string() }
}

/// Dictionary lemmatizer over a `word<TAB>lemma` table. Lookups are
/// case-insensitive; unknown words lemmatize to themselves.
#[derive(Clone, Debug, Default)]
pub struct TableLemmatizer {
    lemmas: HashMap<String, String>,
}

impl TableLemmatizer {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |e: std::io::Error| Error::SourceUnavailable { path: path.to_path_buf(), reason: e.to_string() };
        let file = File::open(path).map_err(unavailable)?;
        let origin = path.display().to_string();
        let (lemmas, skipped) = read_tab_table(BufReader::new(file), &origin, |v| (!v.is_empty()).then(|| v.to_string())).map_err(unavailable)?;
        info!(source = %origin, entries = lemmas.len(), skipped, "lemma table loaded");
        Ok(Self { lemmas })
    }

    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: Into<String>,
    {
        Self { lemmas: pairs.into_iter().map(|(w, l)| (w.as_ref().to_lowercase(), l.into())).collect() }
    }
}

impl Lemmatizer for TableLemmatizer {
    fn lemma(&self, word: &str) -> String {
        self.lemmas.get(&word.to_lowercase()).cloned().unwrap_or_else(|| word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_falls_back_to_the_word() {
        let t = TableLemmatizer::from_pairs([("Running", "run"), ("mice", "mouse")]);
        assert_eq!(t.lemma("running"), "run");
        assert_eq!(t.lemma("MICE"), "mouse");
        assert_eq!(t.lemma("region"), "region");
        assert_eq!(IdentityLemmatizer.lemma("Cut"), "Cut");
    }

    #[test]
    fn table_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lemmas.tsv");
        std::fs::write(&path, "went\tgo\nbroken line\n").unwrap();
        assert_eq!(TableLemmatizer::load(&path).unwrap().lemma("went"), "go");
    }
}
