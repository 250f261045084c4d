//! Region merging: collapse boxes that substantially overlap.
//!
//! The extractor and refiner can both touch the same visual element,
//! leaving near-duplicate boxes (overlapping components, or split
//! segments that still overlap after padding). Merging is a single
//! greedy left-to-right pass:
//!
//! - the first unclaimed region anchors a group;
//! - every later unclaimed region whose `IoU` **with the anchor** exceeds
//!   the threshold joins the group and is claimed;
//! - a group of more than one region becomes the union box, with the
//!   members' `area` values summed.
//!
//! This is not a transitive closure. A region that overlaps a group
//! member but not the anchor stays separate, so the output can still
//! contain a pair above the threshold. The summed area also counts
//! pixels twice where members' foreground overlapped.

use crate::types::Region;

/// Merge overlapping regions in one greedy pass.
///
/// Output order follows the anchors' input order.
#[must_use = "returns the merged regions"]
pub fn merge_overlapping(regions: &[Region], iou_threshold: f64) -> Vec<Region> {
    let mut claimed = vec![false; regions.len()];
    let mut merged = Vec::with_capacity(regions.len());

    for (i, &anchor) in regions.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;

        let mut combined = anchor;
        for (j, &candidate) in regions.iter().enumerate().skip(i + 1) {
            if claimed[j] || anchor.iou(candidate) <= iou_threshold {
                continue;
            }
            claimed[j] = true;
            combined = combined.union(candidate);
        }
        merged.push(combined);
    }

    merged
}
