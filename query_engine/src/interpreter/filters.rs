// query_engine/src/interpreter/filters.rs
//! Filter operator semantics, shared by node/edge/path evaluation.
//! Invalid regexes and incomparable operands are filter-non-match, never
//! errors, so one bad filter degrades rather than aborts a query.

use regex::RegexBuilder;
use serde_json::Value;

use crate::query::FilterOp;

/// Regex patterns longer than this never match (ReDoS guard).
pub const MAX_REGEX_PATTERN_LEN: usize = 200;

/// Apply one operator. An absent actual value is treated as JSON null,
/// matching the permissive behavior of map lookups on the wire format
/// (`ne` against an absent field passes, `eq` fails unless the expected
/// value is itself null).
pub fn apply_operator(actual: Option<&Value>, op: FilterOp, expected: &Value) -> bool {
    let actual = actual.unwrap_or(&Value::Null);
    match op {
        FilterOp::Eq => values_equal(actual, expected),
        FilterOp::Ne => !values_equal(actual, expected),
        FilterOp::In => match expected {
            Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        FilterOp::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        },
        FilterOp::Regex => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => regex_matches(pattern, text),
            _ => false,
        },
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            match compare_values(actual, expected) {
                Some(ordering) => match op {
                    FilterOp::Gt => ordering.is_gt(),
                    FilterOp::Gte => ordering.is_ge(),
                    FilterOp::Lt => ordering.is_lt(),
                    FilterOp::Lte => ordering.is_le(),
                    _ => unreachable!(),
                },
                // Fail closed when either operand is missing or the pair
                // is not comparable.
                None => false,
            }
        }
    }
}

/// Case-insensitive matching with the pattern length cap; over-length or
/// invalid patterns fail to match rather than erroring.
pub fn regex_matches(pattern: &str, text: &str) -> bool {
    if pattern.len() > MAX_REGEX_PATTERN_LEN {
        return false;
    }
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// Equality: case-insensitive for string pairs, exact otherwise.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

/// Ordered comparison over like kinds only: numbers by value, strings
/// lexicographically. Mixed kinds and nulls are incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
