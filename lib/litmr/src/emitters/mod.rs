//! Per-record emitters, one per analysis. Each is a pure function of its input
//! line plus read-only collaborators.

mod bigram;
mod decade;
mod frequency;
mod prep;
mod sentiment;

pub use bigram::BigramEmitter;
pub use decade::{decade_of, DecadeEmitter, FREQUENCY_LABEL, SENTIMENT_LABEL};
pub use frequency::FrequencyEmitter;
pub use prep::BigramPrepEmitter;
pub use sentiment::SentimentEmitter;

use crate::api::Skip;

/// Splits `line` at tabs, requiring exactly two fields.
pub(crate) fn split_pair(line: &str) -> Result<(&str, &str), Skip> {
    let mut fields = line.split('\t');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        (Some(_), None, _) => Err(Skip::MissingTab),
        _ => Err(Skip::FieldCount),
    }
}

pub(crate) fn parse_int(field: &str) -> Result<i64, Skip> {
    field.trim().parse::<i64>().map_err(|_| Skip::NotNumeric)
}
