//! Sentiment lexicon: an immutable `word -> score` table loaded once per worker.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lexicon {
    scores: HashMap<String, i64>,
}

/// Reads `key<TAB>value` lines. Lines with a field count other than two, or
/// whose value `parse` rejects, are skipped and counted.
pub(crate) fn read_tab_table<R, T, P>(reader: R, origin: &str, mut parse: P) -> std::io::Result<(HashMap<String, T>, u64)>
where
    R: BufRead,
    P: FnMut(&str) -> Option<T>,
{
    let mut table = HashMap::new();
    let mut skipped = 0u64;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').collect();
        let parsed = match fields.as_slice() {
            [key, value] if !key.trim().is_empty() => parse(value.trim()).map(|v| (key.trim().to_lowercase(), v)),
            _ => None,
        };
        match parsed {
            Some((key, value)) => {
                table.insert(key, value);
            }
            None => {
                skipped += 1;
                debug!(origin, line = lineno + 1, content = %line, "skipping malformed table line");
            }
        }
    }
    Ok((table, skipped))
}

impl Lexicon {
    /// Loads the lexicon at `path`. An unreadable source is fatal; malformed lines are not.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::SourceUnavailable { path: path.to_path_buf(), reason: e.to_string() })?;
        let origin = path.display().to_string();
        let lexicon = Self::from_reader(BufReader::new(file), &origin).map_err(|e| Error::SourceUnavailable { path: path.to_path_buf(), reason: e.to_string() })?;
        info!(source = %origin, entries = lexicon.len(), "lexicon loaded");
        Ok(lexicon)
    }

    pub fn from_reader<R: BufRead>(reader: R, origin: &str) -> std::io::Result<Self> {
        let (scores, skipped) = read_tab_table(reader, origin, |v| v.parse::<i64>().ok())?;
        if skipped > 0 {
            info!(source = origin, skipped, "lexicon lines skipped");
        }
        Ok(Self { scores })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        Self { scores: pairs.into_iter().map(|(w, s)| (w.as_ref().to_lowercase(), s)).collect() }
    }

    /// Looks up an already lowercased word.
    pub fn score(&self, word: &str) -> Option<i64> { self.scores.get(word).copied() }

    pub fn len(&self) -> usize { self.scores.len() }

    pub fn is_empty(&self) -> bool { self.scores.is_empty() }
}
