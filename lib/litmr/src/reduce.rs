//! Reduction policies shared by the analysis stages.

use crate::api::Reducer;
use crate::key::Key;

// Totals clamp at the i64 bounds instead of wrapping or panicking.
fn add(a: i64, b: i64) -> i64 { a.saturating_add(b) }

/// Saturating integer addition; identity 0. Offers itself as a map-side combiner.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumReducer;

impl Reducer for SumReducer {
    type Key = Key;
    type ValueIn = i64;
    type Out = i64;

    fn do_reduce<I>(&self, _key: &Key, values: I) -> i64
    where
        I: Iterator<Item = i64>,
    {
        values.fold(0, add)
    }

    fn combiner(&self) -> Option<fn(i64, i64) -> i64> { Some(add as fn(i64, i64) -> i64) }
}

/// Joins string values with a separator.
///
/// Values are sorted before joining, so the output does not depend on the
/// order in which the shuffle delivered them.
#[derive(Clone, Debug)]
pub struct JoinReducer {
    separator: String,
}

impl JoinReducer {
    pub fn new(separator: impl Into<String>) -> Self { Self { separator: separator.into() } }
}

impl Default for JoinReducer {
    fn default() -> Self { Self::new(" ") }
}

impl Reducer for JoinReducer {
    type Key = Key;
    type ValueIn = String;
    type Out = String;

    fn do_reduce<I>(&self, _key: &Key, values: I) -> String
    where
        I: Iterator<Item = String>,
    {
        let mut values: Vec<String> = values.collect();
        values.sort_unstable();
        values.join(&self.separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_is_order_independent_and_zero_for_nothing() {
        let k = Key::single("k");
        assert_eq!(SumReducer.do_reduce(&k, vec![3, -1, 5].into_iter()), 7);
        assert_eq!(SumReducer.do_reduce(&k, vec![5, 3, -1].into_iter()), 7);
        assert_eq!(SumReducer.do_reduce(&k, std::iter::empty()), 0);
        let combine = SumReducer.combiner().unwrap();
        assert_eq!(combine(combine(1, 2), 3), 6);
    }

    #[test]
    fn sum_saturates_instead_of_overflowing() {
        let k = Key::single("SentimentScore_Decade_1880");
        assert_eq!(SumReducer.do_reduce(&k, vec![i64::MAX, 1].into_iter()), i64::MAX);
        assert_eq!(SumReducer.do_reduce(&k, vec![i64::MIN, -1, 5].into_iter()), i64::MIN + 5);
        let combine = SumReducer.combiner().unwrap();
        assert_eq!(combine(i64::MAX, i64::MAX), i64::MAX);
    }

    #[test]
    fn join_sorts_before_joining() {
        let k = Key::new(["1", "1885"]);
        let a = JoinReducer::default().do_reduce(&k, vec!["region".to_string(), "cut".to_string(), "during".to_string()].into_iter());
        let b = JoinReducer::default().do_reduce(&k, vec!["during".to_string(), "region".to_string(), "cut".to_string()].into_iter());
        assert_eq!(a, "cut during region");
        assert_eq!(a, b);
        assert!(JoinReducer::default().combiner().is_none());
    }
}
