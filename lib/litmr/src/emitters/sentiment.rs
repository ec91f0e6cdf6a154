use super::{parse_int, split_pair};
use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;
use crate::lexicon::Lexicon;
use std::sync::Arc;

/// `bookId,year,word<TAB>frequency` -> `(bookId, year) -> score(word) * frequency`.
#[derive(Clone, Debug)]
pub struct SentimentEmitter {
    lexicon: Arc<Lexicon>,
}

impl SentimentEmitter {
    pub fn new(lexicon: Arc<Lexicon>) -> Self { Self { lexicon } }
}

impl Mapper for SentimentEmitter {
    type Key = Key;
    type Value = i64;

    fn do_map(&self, record: &str) -> MapOutcome<Key, i64> {
        if record.trim().is_empty() {
            return Err(Skip::Blank);
        }
        let (meta, frequency) = split_pair(record)?;
        let meta: Vec<&str> = meta.split(',').collect();
        let [book_id, year, word] = meta.as_slice() else {
            return Err(Skip::FieldCount);
        };
        let frequency = parse_int(frequency)?;
        let score = self.lexicon.score(&word.trim().to_lowercase()).ok_or(Skip::LexiconMiss)?;
        let total = score.checked_mul(frequency).ok_or(Skip::NotNumeric)?;
        Ok(vec![(Key::new([*book_id, *year]), total)])
    }
}
