//! Selection expression parsing.
//!
//! Parses user selections like `1,3, 5-7` into a sorted, deduplicated set of
//! zero-based indices, validated against the length of the list being
//! selected from. Pure text in, indices out; no terminal I/O.

use std::collections::BTreeSet;
use thiserror::Error;

/// Error type for selection parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// The input contained no selection at all.
    #[error("empty selection")]
    Empty,

    /// A piece of the input was not a number.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// A range was malformed or inverted.
    #[error("invalid range '{0}'")]
    InvalidRange(String),

    /// A selected number fell outside 1..=len.
    #[error("selection {value} out of bounds (1-{max})")]
    OutOfBounds { value: usize, max: usize },
}

/// Parse a selection expression against a list of `list_len` items.
///
/// Input is 1-based (`1` is the first item); the result is 0-based, sorted,
/// and deduplicated. Supported pieces, comma-separated: single numbers (`3`)
/// and inclusive ranges (`5-7`).
pub fn parse_selection(input: &str, list_len: usize) -> Result<Vec<usize>, SelectError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SelectError::Empty);
    }

    let mut indices = BTreeSet::new();

    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(SelectError::InvalidNumber(part.to_string()));
        }

        if let Some((start_str, end_str)) = part.split_once('-') {
            let start: usize = start_str
                .trim()
                .parse()
                .map_err(|_| SelectError::InvalidRange(part.to_string()))?;
            let end: usize = end_str
                .trim()
                .parse()
                .map_err(|_| SelectError::InvalidRange(part.to_string()))?;

            if start == 0 || start > end {
                return Err(SelectError::InvalidRange(part.to_string()));
            }
            if end > list_len {
                return Err(SelectError::OutOfBounds {
                    value: end,
                    max: list_len,
                });
            }
            for value in start..=end {
                indices.insert(value - 1);
            }
        } else {
            let value: usize = part
                .parse()
                .map_err(|_| SelectError::InvalidNumber(part.to_string()))?;
            if value == 0 || value > list_len {
                return Err(SelectError::OutOfBounds {
                    value,
                    max: list_len,
                });
            }
            indices.insert(value - 1);
        }
    }

    Ok(indices.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_numbers_and_ranges() {
        assert_eq!(parse_selection("1,3, 5-7", 10), Ok(vec![0, 2, 4, 5, 6]));
        assert_eq!(parse_selection("2", 2), Ok(vec![1]));
        assert_eq!(parse_selection("1-3", 3), Ok(vec![0, 1, 2]));
    }

    #[test]
    fn test_duplicates_are_deduplicated() {
        assert_eq!(parse_selection("1,1,1-2,2", 5), Ok(vec![0, 1]));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_selection("", 5), Err(SelectError::Empty));
        assert_eq!(parse_selection("   ", 5), Err(SelectError::Empty));
    }

    #[test]
    fn test_invalid_numbers() {
        assert_eq!(
            parse_selection("abc", 5),
            Err(SelectError::InvalidNumber("abc".to_string()))
        );
        assert_eq!(
            parse_selection("1,,2", 5),
            Err(SelectError::InvalidNumber(String::new()))
        );
    }

    #[test]
    fn test_invalid_ranges() {
        assert_eq!(
            parse_selection("5-3", 10),
            Err(SelectError::InvalidRange("5-3".to_string()))
        );
        assert_eq!(
            parse_selection("0-2", 10),
            Err(SelectError::InvalidRange("0-2".to_string()))
        );
        assert_eq!(
            parse_selection("1-x", 10),
            Err(SelectError::InvalidRange("1-x".to_string()))
        );
    }

    #[test]
    fn test_out_of_bounds() {
        assert_eq!(
            parse_selection("6", 5),
            Err(SelectError::OutOfBounds { value: 6, max: 5 })
        );
        assert_eq!(
            parse_selection("0", 5),
            Err(SelectError::OutOfBounds { value: 0, max: 5 })
        );
        assert_eq!(
            parse_selection("3-8", 5),
            Err(SelectError::OutOfBounds { value: 8, max: 5 })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // Any set of in-bounds 1-based picks formats to an expression that
        // parses back to exactly that set, 0-based and sorted.
        #[test]
        fn prop_round_trip_single_numbers(
            len in 1usize..100,
            picks in prop::collection::btree_set(1usize..100, 1..10),
        ) {
            let picks: std::collections::BTreeSet<usize> =
                picks.into_iter().filter(|&p| p <= len).collect();
            prop_assume!(!picks.is_empty());

            let expr = picks
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",");

            let parsed = parse_selection(&expr, len).unwrap();
            let expected: Vec<usize> = picks.iter().map(|p| p - 1).collect();
            prop_assert_eq!(parsed, expected);
        }

        // A single range expands to every index between its endpoints.
        #[test]
        fn prop_range_expansion(start in 1usize..50, span in 0usize..20) {
            let end = start + span;
            let expr = format!("{}-{}", start, end);
            let parsed = parse_selection(&expr, end).unwrap();
            let expected: Vec<usize> = (start - 1..end).collect();
            prop_assert_eq!(parsed, expected);
        }
    }
}
