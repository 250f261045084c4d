//! Ranking: largest regions first, bounded output.

use std::cmp::Reverse;

use crate::types::Region;

/// Number of leading regions handed to a vision model as spatial hints.
pub const AI_HINT_LIMIT: usize = 8;

/// Number of leading regions a heuristic classifier consumes when the
/// vision model is unavailable.
pub const FALLBACK_LIMIT: usize = 12;

/// Sort by `area` descending and keep at most `max_regions`.
///
/// The sort is stable: regions with equal area keep their relative
/// order.
#[must_use = "returns the ranked regions"]
pub fn rank_regions(mut regions: Vec<Region>, max_regions: usize) -> Vec<Region> {
    regions.sort_by_key(|r| Reverse(r.area));
    regions.truncate(max_regions);
    regions
}

/// The first `limit` regions of a ranked list.
#[must_use]
pub fn leading(regions: &[Region], limit: usize) -> &[Region] {
    &regions[..regions.len().min(limit)]
}
