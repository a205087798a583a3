//! Chapter selection by number ranges and ordering by chapter number.

use crate::models::Filterable;
use crate::ranges::Range;

/// Sorts items ascending by chapter number (stable).
pub fn sort_by_number<T: Filterable>(items: &mut [T]) {
    items.sort_by(|a, b| a.number().total_cmp(&b.number()));
}

/// Returns the items whose number falls in at least one range, sorted
/// ascending by number.
///
/// Overlapping ranges do not duplicate items: every item is kept at most
/// once. No ranges select nothing.
#[must_use]
pub fn filter_ranges<T: Filterable + Clone>(items: &[T], ranges: &[Range]) -> Vec<T> {
    let mut selected: Vec<T> = items
        .iter()
        .filter(|item| ranges.iter().any(|range| range.contains(item.number())))
        .cloned()
        .collect();
    sort_by_number(&mut selected);
    selected
}
