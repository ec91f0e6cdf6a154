//! Catalog record cleaning: `bookId,bookName,publicationYear` -> `(bookId, year) -> cleaned name`.

use crate::api::{MapOutcome, Mapper, Skip};
use crate::key::Key;
use regex::Regex;
use std::sync::OnceLock;

fn strip_pattern() -> &'static Regex {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    STRIP.get_or_init(|| Regex::new(r"[^a-zA-Z0-9 \t\n\x0B\x0C\r]").expect("literal pattern"))
}

/// Lowercases a title and drops every character other than ASCII letters, digits and ASCII whitespace.
pub fn clean_title(title: &str) -> String {
    strip_pattern().replace_all(&title.trim().to_lowercase(), "").into_owned()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RecordNormalizer;

impl Mapper for RecordNormalizer {
    type Key = Key;
    type Value = String;

    fn do_map(&self, record: &str) -> MapOutcome<Key, String> {
        if record.trim().is_empty() {
            return Err(Skip::Blank);
        }
        let fields: Vec<&str> = record.split(',').collect();
        let [book_id, name, year] = fields.as_slice() else {
            return Err(Skip::FieldCount);
        };
        Ok(vec![(Key::new([book_id.trim(), year.trim()]), clean_title(name))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_name_and_keys_by_book_and_year() {
        let out = RecordNormalizer.do_map(" 12 , The Time-Machine: A Novel! , 1895 ").unwrap();
        assert_eq!(out, vec![(Key::new(["12", "1895"]), "the timemachine a novel".to_string())]);
    }

    #[test]
    fn field_count_other_than_three_is_dropped() {
        assert_eq!(RecordNormalizer.do_map("1,Moby Dick, or The Whale,1851"), Err(Skip::FieldCount));
        assert_eq!(RecordNormalizer.do_map("1,Moby Dick"), Err(Skip::FieldCount));
        assert_eq!(RecordNormalizer.do_map("   "), Err(Skip::Blank));
    }

    #[test]
    fn cleaned_names_only_hold_lowercase_alphanumerics_and_whitespace() {
        for name in ["Ünïcødé Tïtle", "ALL CAPS 1984", "tabs\tand  spaces", "Ça va? ¡Sí!", "İstanbul", "nb\u{00A0}sp\u{2009}thin"] {
            let cleaned = clean_title(name);
            assert!(
                cleaned.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')),
                "{name:?} -> {cleaned:?}"
            );
        }
    }

    #[test]
    fn unicode_spaces_are_stripped_not_kept() {
        assert_eq!(clean_title("a\u{00A0}b\u{2003}c"), "abc");
        assert_eq!(clean_title("Two\u{3000}Cities"), "twocities");
        assert_eq!(clean_title("tab\tkept"), "tab\tkept");
    }
}
