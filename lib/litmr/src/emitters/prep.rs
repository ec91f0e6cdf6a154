use super::split_pair;
use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;

/// Regroups word counts by book: `bookId,year,lemma<TAB>count` -> `(bookId, year) -> lemma`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BigramPrepEmitter;

impl Mapper for BigramPrepEmitter {
    type Key = Key;
    type Value = String;

    fn do_map(&self, record: &str) -> MapOutcome<Key, String> {
        if record.trim().is_empty() {
            return Err(Skip::Blank);
        }
        let (meta, _count) = split_pair(record)?;
        let meta: Vec<&str> = meta.split(',').collect();
        let [book_id, year, lemma] = meta.as_slice() else {
            return Err(Skip::FieldCount);
        };
        Ok(vec![(Key::new([*book_id, *year]), lemma.to_string())])
    }
}
