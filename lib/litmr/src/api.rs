use crate::stats::StageReport;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{self, Display};
use std::hash::Hash;
use std::path::PathBuf;

// ========== Per-record outcome ==========

/// Why a record produced no pairs. Skips are recovered locally and only counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Skip {
    /// Empty or whitespace-only record.
    Blank,
    /// Wrong number of delimited fields.
    FieldCount,
    /// Expected a tab separator and found none.
    MissingTab,
    /// A field that must be an integer did not parse.
    NotNumeric,
    /// Word absent from the sentiment lexicon.
    LexiconMiss,
}

impl Skip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skip::Blank => "blank",
            Skip::FieldCount => "field_count",
            Skip::MissingTab => "missing_tab",
            Skip::NotNumeric => "not_numeric",
            Skip::LexiconMiss => "lexicon_miss",
        }
    }
}

impl Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Result of mapping one record: the emitted pairs, or the reason it was skipped.
pub type MapOutcome<K, V> = std::result::Result<Vec<(K, V)>, Skip>;

// ========== Core MapReduce traits ==========

/// Pure per-record emitter. The same record must always produce the same pairs.
pub trait Mapper {
    type Key: Send + Sync + Serialize + DeserializeOwned + Hash + Eq + Clone + Display + 'static;
    type Value: Send + Sync + Serialize + DeserializeOwned + Clone + 'static;

    fn do_map(&self, record: &str) -> MapOutcome<Self::Key, Self::Value>;
}

/// Reducer produces exactly one output value per grouped key.
/// Value arrival order is unspecified, so reductions must not depend on it.
pub trait Reducer {
    type Key: Send + Sync + Serialize + DeserializeOwned + Hash + Eq + Clone + Display + 'static;
    type ValueIn: Send + Sync + Serialize + DeserializeOwned + Clone + 'static;
    type Out: Display;

    fn do_reduce<I>(&self, key: &Self::Key, values: I) -> Self::Out
    where
        I: Iterator<Item = Self::ValueIn>;

    /// Merge function for map-side pre-aggregation. Only associative and
    /// commutative reductions whose output type equals their input may offer one.
    fn combiner(&self) -> Option<fn(Self::ValueIn, Self::ValueIn) -> Self::ValueIn> { None }
}

// ========== Executable stage interface ==========

pub trait ExecutablePipeline {
    fn add_input(&mut self, input_path: impl Into<PathBuf>);
    fn add_output(&mut self, output_path: impl Into<PathBuf>);

    fn map_reduce<M, R>(&mut self, mapper: M, reducer: R) -> Result<StageReport>
    where
        M: Mapper + Send + Sync,
        R: Reducer<Key = M::Key, ValueIn = M::Value> + Send + Sync;
}
