use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;

/// Free text -> `"w[i] w[i+1]" -> 1` for each adjacent word pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct BigramEmitter;

impl Mapper for BigramEmitter {
    type Key = Key;
    type Value = i64;

    fn do_map(&self, record: &str) -> MapOutcome<Key, i64> {
        let words: Vec<&str> = record.split_whitespace().collect();
        if words.is_empty() {
            return Err(Skip::Blank);
        }
        Ok(words.windows(2).map(|w| (Key::single(format!("{} {}", w[0], w[1])), 1)).collect())
    }
}
