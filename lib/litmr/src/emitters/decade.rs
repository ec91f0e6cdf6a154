use super::parse_int;
use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;

pub const SENTIMENT_LABEL: &str = "SentimentScore";
pub const FREQUENCY_LABEL: &str = "WordFrequency";

/// Floor of `year / 10`, times ten.
pub fn decade_of(year: i64) -> i64 { year.div_euclid(10) * 10 }

// Trailing empty fields are dropped, so `1,1885\t-3\t` still has two.
fn split_fields(record: &str, sep: char) -> Vec<&str> {
    let mut fields: Vec<&str> = record.split(sep).collect();
    while fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Buckets per-book sentiment totals (`bookId,year<TAB>score`) or flattened
/// word counts (`bookId,year,lemma,count`) by decade. A tab selects the
/// sentiment shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecadeEmitter;

impl DecadeEmitter {
    fn bucket(label: &str, year: &str, value: &str) -> MapOutcome<Key, i64> {
        let decade = decade_of(parse_int(year)?);
        let value = parse_int(value)?;
        Ok(vec![(Key::single(format!("{label}_Decade_{decade}")), value)])
    }
}

impl Mapper for DecadeEmitter {
    type Key = Key;
    type Value = i64;

    fn do_map(&self, record: &str) -> MapOutcome<Key, i64> {
        if record.trim().is_empty() {
            return Err(Skip::Blank);
        }
        if record.contains('\t') {
            let fields = split_fields(record, '\t');
            let [book_year, score] = fields.as_slice() else {
                return Err(Skip::FieldCount);
            };
            let book_year = split_fields(book_year, ',');
            let [_book_id, year] = book_year.as_slice() else {
                return Err(Skip::FieldCount);
            };
            Self::bucket(SENTIMENT_LABEL, year, score)
        } else {
            let fields = split_fields(record, ',');
            let [_book_id, year, _lemma, count] = fields.as_slice() else {
                return Err(Skip::FieldCount);
            };
            Self::bucket(FREQUENCY_LABEL, year, count)
        }
    }
}
