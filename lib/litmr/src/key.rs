use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping key: an ordered tuple of strings.
///
/// Two keys group together only when every component is byte-for-byte equal.
/// The textual form joins components with `,`, which is how stage artifacts
/// render their left-hand column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn single(part: impl Into<String>) -> Self { Self(vec![part.into()]) }

    pub fn parts(&self) -> &[String] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 { f.write_str(",")?; }
            f.write_str(part)?;
        }
        Ok(())
    }
}
