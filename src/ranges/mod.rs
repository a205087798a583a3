//! Chapter range expressions such as `1-10,12,15-20`.
//!
//! Tokens are parsed independently. A malformed token is skipped with a
//! warning and kept in [`ParsedRanges::skipped`]; it never fails the whole
//! expression. Empty input yields no ranges, which selects nothing.

mod error;

use std::fmt;

use tracing::warn;

pub use error::RangeError;

/// Inclusive interval of chapter numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    /// First chapter number (inclusive).
    pub start: i64,
    /// Last chapter number (inclusive).
    pub end: i64,
}

impl Range {
    /// Creates a range; callers guarantee `start <= end`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Creates a degenerate range holding a single chapter number.
    #[must_use]
    pub fn single(number: i64) -> Self {
        Self::new(number, number)
    }

    /// Returns true if `number` falls inside the range.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn contains(&self, number: f64) -> bool {
        number >= self.start as f64 && number <= self.end as f64
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Outcome of parsing a range expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRanges {
    /// Valid ranges in input order.
    pub ranges: Vec<Range>,
    /// Tokens that were skipped.
    pub skipped: Vec<RangeError>,
}

impl ParsedRanges {
    /// Returns true if no valid range was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Parses a comma separated range expression, skipping malformed tokens.
#[must_use]
#[tracing::instrument(level = "debug")]
pub fn parse_ranges(input: &str) -> ParsedRanges {
    let mut parsed = ParsedRanges::default();

    for token in input.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        match parse_token(token) {
            Ok(range) => parsed.ranges.push(range),
            Err(error) => {
                warn!(token, error = %error, "skipping malformed range");
                parsed.skipped.push(error);
            }
        }
    }

    parsed
}

/// Parses a range expression and returns only the valid ranges.
#[must_use]
pub fn parse(input: &str) -> Vec<Range> {
    parse_ranges(input).ranges
}

fn parse_token(token: &str) -> Result<Range, RangeError> {
    let Some((raw_start, raw_end)) = token.split_once('-') else {
        let number = parse_bound(token, token)?;
        return Ok(Range::single(number));
    };

    let (raw_start, raw_end) = (raw_start.trim(), raw_end.trim());
    if raw_start.is_empty() || raw_end.is_empty() {
        return Err(RangeError::missing_bound(token));
    }

    let start = parse_bound(token, raw_start)?;
    let end = parse_bound(token, raw_end)?;
    if start > end {
        return Err(RangeError::reversed(token, start, end));
    }

    Ok(Range::new(start, end))
}

fn parse_bound(token: &str, value: &str) -> Result<i64, RangeError> {
    value
        .parse::<i64>()
        .map_err(|_| RangeError::invalid_number(token, value))
}
