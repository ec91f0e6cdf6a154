use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;
use crate::lemma::Lemmatizer;
use std::sync::Arc;

/// `bookId,year<TAB>text` -> `((bookId,year), lemma) -> 1` for every token of `text`.
#[derive(Clone)]
pub struct FrequencyEmitter {
    lemmatizer: Arc<dyn Lemmatizer>,
}

impl FrequencyEmitter {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>) -> Self { Self { lemmatizer } }
}

impl Mapper for FrequencyEmitter {
    type Key = Key;
    type Value = i64;

    fn do_map(&self, record: &str) -> MapOutcome<Key, i64> {
        if record.trim().is_empty() {
            return Err(Skip::Blank);
        }
        // Anything after a second tab is ignored.
        let mut fields = record.split('\t');
        let (Some(book_year), Some(text)) = (fields.next(), fields.next()) else {
            return Err(Skip::MissingTab);
        };
        Ok(text
            .split_whitespace()
            .map(|token| (Key::new([book_year.to_string(), self.lemmatizer.lemma(token)]), 1))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::{IdentityLemmatizer, TableLemmatizer};

    fn identity() -> FrequencyEmitter { FrequencyEmitter::new(Arc::new(IdentityLemmatizer)) }

    #[test]
    fn emits_one_per_token_keyed_by_book_year_and_lemma() {
        let out = identity().do_map("1,1885\tcut during certain region").unwrap();
        let rendered: Vec<(String, i64)> = out.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        assert_eq!(
            rendered,
            vec![
                ("1,1885,cut".to_string(), 1),
                ("1,1885,during".to_string(), 1),
                ("1,1885,certain".to_string(), 1),
                ("1,1885,region".to_string(), 1),
            ]
        );
        assert_eq!(out[0].0, Key::new(["1,1885", "cut"]));
    }

    #[test]
    fn repeated_runs_emit_identical_sequences() {
        let e = FrequencyEmitter::new(Arc::new(TableLemmatizer::from_pairs([("cutting", "cut")])));
        let line = "7,1901\tcutting cut  cutting\tignored";
        assert_eq!(e.do_map(line), e.do_map(line));
        assert_eq!(e.do_map(line).unwrap().len(), 3);
        assert!(e.do_map(line).unwrap().iter().all(|(k, _)| k.parts()[1] == "cut"));
    }

    #[test]
    fn lines_without_text_field_emit_nothing() {
        assert_eq!(identity().do_map("1,1885 cut during"), Err(Skip::MissingTab));
        assert_eq!(identity().do_map(""), Err(Skip::Blank));
        assert_eq!(identity().do_map("1,1885\t"), Ok(vec![]));
    }
}
