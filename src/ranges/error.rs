//! Error types for range expression parsing.

use thiserror::Error;

/// Errors for a single malformed range token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Token is not an integer nor an `a-b` pair of integers.
    #[error("invalid range '{token}': '{value}' is not a whole number\n  Suggestion: Use numbers like 5 or 1-10")]
    InvalidNumber {
        /// The whole offending token.
        token: String,
        /// The part that failed to parse.
        value: String,
    },

    /// One side of `a-b` is empty.
    #[error("invalid range '{token}': missing bound\n  Suggestion: Write both ends, e.g. 1-10")]
    MissingBound {
        /// The offending token.
        token: String,
    },

    /// Start is greater than end.
    #[error("invalid range '{token}': start {start} is greater than end {end}\n  Suggestion: Write ranges in ascending order, e.g. {end}-{start}")]
    Reversed {
        /// The offending token.
        token: String,
        /// Parsed start.
        start: i64,
        /// Parsed end.
        end: i64,
    },
}

impl RangeError {
    pub(crate) fn invalid_number(token: &str, value: &str) -> Self {
        Self::InvalidNumber {
            token: token.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn missing_bound(token: &str) -> Self {
        Self::MissingBound {
            token: token.to_string(),
        }
    }

    pub(crate) fn reversed(token: &str, start: i64, end: i64) -> Self {
        Self::Reversed {
            token: token.to_string(),
            start,
            end,
        }
    }
}
