//! Region refinement: split oversized regions at projection gaps.
//!
//! One connected component can span several unrelated UI elements,
//! e.g. a whole content column that shifted. Any region whose bounding
//! box covers more than [`DiffConfig::split_area_ratio`] of the image is
//! re-examined on the denoised mask, cropped to its box:
//!
//! 1. **Rows.** Count foreground per row. A row is a gap when its count
//!    is below `gap_density_ratio * width`. Every run of at least
//!    `min_row_gap` gap rows ends one segment and starts the next.
//! 2. **Columns.** Only if the row pass kept at most one child: the same
//!    scan over columns, with `gap_density_ratio * height` and
//!    `min_col_gap`.
//!
//! A segment survives when it holds more than `min_segment_pixels`
//! foreground pixels; it becomes a child region around its tight box
//! padded by `segment_padding` and clamped to the crop. More than one
//! child replaces the parent, otherwise the parent is kept as is.
//!
//! Splitting is one level deep: children are never split again, even
//! when they still exceed the area ratio.

use std::ops::Range;

use image::GrayImage;
use log::trace;

use crate::types::{DiffConfig, Dimensions, Region};

/// Output of [`refine_regions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    /// Regions after splitting, in input order with children in place
    /// of their parent.
    pub regions: Vec<Region>,
    /// Number of regions large enough to be split candidates.
    pub candidates: usize,
    /// Number of candidates actually replaced by children.
    pub split: usize,
}

/// Projection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// One projection value per row; splits stack vertically.
    Rows,
    /// One projection value per column; splits sit side by side.
    Columns,
}

/// Half-open rectangle in crop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// A region's box cut out of the mask.
struct Crop<'a> {
    mask: &'a GrayImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl<'a> Crop<'a> {
    /// Crop `mask` to `region`, clamped to the mask bounds.
    fn new(mask: &'a GrayImage, region: Region) -> Self {
        let x = region.x.min(mask.width());
        let y = region.y.min(mask.height());
        let right = region.right().min(mask.width());
        let bottom = region.bottom().min(mask.height());
        Self {
            mask,
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn is_foreground(&self, col: u32, row: u32) -> bool {
        self.mask.get_pixel(self.x + col, self.y + row).0[0] > 0
    }

    /// Foreground count per line along `axis`.
    fn profile(&self, axis: Axis) -> Vec<u32> {
        match axis {
            Axis::Rows => (0..self.height)
                .map(|row| {
                    (0..self.width)
                        .map(|col| u32::from(self.is_foreground(col, row)))
                        .sum()
                })
                .collect(),
            Axis::Columns => (0..self.width)
                .map(|col| {
                    (0..self.height)
                        .map(|row| u32::from(self.is_foreground(col, row)))
                        .sum()
                })
                .collect(),
        }
    }

    /// The slab of the crop covered by `lines` along `axis`.
    const fn slab(&self, axis: Axis, lines: &Range<usize>) -> Rect {
        #[allow(clippy::cast_possible_truncation)]
        let (start, end) = (lines.start as u32, lines.end as u32);
        match axis {
            Axis::Rows => Rect {
                x0: 0,
                y0: start,
                x1: self.width,
                y1: end,
            },
            Axis::Columns => Rect {
                x0: start,
                y0: 0,
                x1: end,
                y1: self.height,
            },
        }
    }

    /// Foreground count and tight bounding box inside `rect`.
    fn tight_box(&self, rect: Rect) -> (u64, Option<Rect>) {
        let mut count = 0u64;
        let mut tight: Option<Rect> = None;
        for row in rect.y0..rect.y1 {
            for col in rect.x0..rect.x1 {
                if !self.is_foreground(col, row) {
                    continue;
                }
                count += 1;
                let b = tight.get_or_insert(Rect {
                    x0: col,
                    y0: row,
                    x1: col + 1,
                    y1: row + 1,
                });
                b.x0 = b.x0.min(col);
                b.y0 = b.y0.min(row);
                b.x1 = b.x1.max(col + 1);
                b.y1 = b.y1.max(row + 1);
            }
        }
        (count, tight)
    }

    fn count_foreground(&self, rect: Rect) -> u64 {
        (rect.y0..rect.y1)
            .flat_map(|row| (rect.x0..rect.x1).map(move |col| (col, row)))
            .filter(|&(col, row)| self.is_foreground(col, row))
            .count() as u64
    }

    /// Grow `rect` by `padding` on every side, clamped to the crop.
    fn pad(&self, rect: Rect, padding: u32) -> Rect {
        Rect {
            x0: rect.x0.saturating_sub(padding),
            y0: rect.y0.saturating_sub(padding),
            x1: rect.x1.saturating_add(padding).min(self.width),
            y1: rect.y1.saturating_add(padding).min(self.height),
        }
    }
}

/// Split every oversized region; pass the rest through.
///
/// `mask` is the denoised binary mask the regions were derived from.
#[must_use = "returns the refined regions"]
#[allow(clippy::cast_precision_loss)]
pub fn refine_regions(regions: Vec<Region>, mask: &GrayImage, config: &DiffConfig) -> Refinement {
    let trigger = Dimensions::of(mask).pixel_count() as f64 * config.split_area_ratio;
    let mut refined = Vec::with_capacity(regions.len());
    let mut candidates = 0;
    let mut split = 0;

    for region in regions {
        if region.box_area() as f64 <= trigger {
            refined.push(region);
            continue;
        }
        candidates += 1;

        let children = split_region(mask, region, config);
        if children.len() > 1 {
            trace!("split {region:?} into {} children", children.len());
            split += 1;
            refined.extend(children);
        } else {
            trace!("kept {region:?}: no separating gap");
            refined.push(region);
        }
    }

    Refinement {
        regions: refined,
        candidates,
        split,
    }
}

/// Children of `region` from the row pass, or from the column pass if
/// the row pass kept at most one child.
///
/// The result replaces the parent only when it holds more than one
/// region; the caller decides.
#[must_use = "returns the child regions"]
pub fn split_region(mask: &GrayImage, region: Region, config: &DiffConfig) -> Vec<Region> {
    let crop = Crop::new(mask, region);
    if crop.is_empty() {
        return Vec::new();
    }

    let rows = split_along(&crop, Axis::Rows, config);
    if rows.len() > 1 {
        return rows;
    }
    split_along(&crop, Axis::Columns, config)
}

fn split_along(crop: &Crop<'_>, axis: Axis, config: &DiffConfig) -> Vec<Region> {
    let (line_len, min_gap) = match axis {
        Axis::Rows => (crop.width, config.min_row_gap),
        Axis::Columns => (crop.height, config.min_col_gap),
    };
    let gap_limit = f64::from(line_len) * config.gap_density_ratio;
    let is_gap: Vec<bool> = crop
        .profile(axis)
        .into_iter()
        .map(|count| f64::from(count) < gap_limit)
        .collect();

    gap_segments(&is_gap, min_gap as usize)
        .iter()
        .filter_map(|lines| {
            let (count, tight) = crop.tight_box(crop.slab(axis, lines));
            if count <= config.min_segment_pixels {
                return None;
            }
            tight.map(|t| child_region(crop, t, config.segment_padding))
        })
        .collect()
}

/// Segments separated by runs of at least `min_gap` gap lines.
///
/// A gap run only closes a segment when the segment in front of it is
/// non-empty; leading gap lines stay attached to the first segment and
/// trailing ones to the last.
fn gap_segments(is_gap: &[bool], min_gap: usize) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut run = 0;

    for (line, &gap) in is_gap.iter().enumerate() {
        if gap {
            run += 1;
            continue;
        }
        if run >= min_gap && line - run > start {
            segments.push(start..line - run);
            start = line;
        }
        run = 0;
    }
    if start < is_gap.len() {
        segments.push(start..is_gap.len());
    }
    segments
}

/// Child region around a tight box: padded, clamped, and with its
/// foreground re-counted inside the padded box.
///
/// The area is floored at a quarter of the padded box so thin strokes
/// still rank alongside solid blocks of similar extent.
fn child_region(crop: &Crop<'_>, tight: Rect, padding: u32) -> Region {
    let padded = crop.pad(tight, padding);
    let w = padded.x1 - padded.x0;
    let h = padded.y1 - padded.y0;
    let floor = u64::from(w) * u64::from(h) / 4;
    Region::new(
        crop.x + padded.x0,
        crop.y + padded.y0,
        w,
        h,
        crop.count_foreground(padded).max(floor),
    )
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    /// Two wide bands joined by a one-pixel vertical stroke.
    fn stacked_bands() -> (GrayImage, Region) {
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 20, 20, 180, 80);
        fill(&mut mask, 100, 80, 101, 120);
        fill(&mut mask, 20, 120, 180, 180);
        let area = 160 * 60 * 2 + 40;
        (mask, Region::new(20, 20, 160, 160, area))
    }

    #[test]
    fn gap_segments_without_gaps_is_one_segment() {
        assert_eq!(gap_segments(&[false; 10], 5), vec![0..10]);
    }

    #[test]
    fn gap_segments_splits_on_long_run() {
        let mut is_gap = vec![false; 20];
        for g in &mut is_gap[8..14] {
            *g = true;
        }
        assert_eq!(gap_segments(&is_gap, 5), vec![0..8, 14..20]);
    }

    #[test]
    fn gap_segments_ignores_short_run() {
        let mut is_gap = vec![false; 20];
        for g in &mut is_gap[8..12] {
            *g = true;
        }
        assert_eq!(gap_segments(&is_gap, 5), vec![0..20]);
    }

    #[test]
    fn gap_segments_leading_gap_stays_attached() {
        let mut is_gap = vec![false; 20];
        for g in &mut is_gap[0..6] {
            *g = true;
        }
        assert_eq!(gap_segments(&is_gap, 5), vec![0..20]);
    }

    #[test]
    fn row_gap_splits_stacked_bands() {
        let (mask, region) = stacked_bands();
        let children = split_region(&mask, region, &DiffConfig::default());
        // Tight boxes padded by 4 rows into the gap; the stroke adds 4
        // pixels inside each padded box.
        assert_eq!(
            children,
            vec![
                Region::new(20, 20, 160, 64, 9604),
                Region::new(20, 116, 160, 64, 9604),
            ]
        );
    }

    #[test]
    fn column_gap_splits_side_by_side_blocks() {
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 10, 10, 90, 190);
        fill(&mut mask, 110, 10, 190, 190);
        let region = Region::new(10, 10, 180, 180, 80 * 180 * 2);
        let children = split_region(&mask, region, &DiffConfig::default());
        assert_eq!(
            children,
            vec![
                Region::new(10, 10, 84, 180, 80 * 180),
                Region::new(106, 10, 84, 180, 80 * 180),
            ]
        );
    }

    #[test]
    fn short_column_gap_does_not_split() {
        // Seven empty columns: below the vertical minimum of eight.
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 10, 10, 90, 190);
        fill(&mut mask, 97, 10, 177, 190);
        let region = Region::new(10, 10, 167, 180, 80 * 180 * 2);
        let refined = refine_regions(vec![region], &mask, &DiffConfig::default());
        assert_eq!(refined.regions, vec![region]);
        assert_eq!(refined.candidates, 1);
        assert_eq!(refined.split, 0);
    }

    #[test]
    fn small_regions_pass_through_untouched() {
        let (mask, _) = stacked_bands();
        // 50x50 = 2500 < 15% of 40000.
        let region = Region::new(20, 20, 50, 50, 1234);
        let refined = refine_regions(vec![region], &mask, &DiffConfig::default());
        assert_eq!(refined.regions, vec![region]);
        assert_eq!(refined.candidates, 0);
    }

    #[test]
    fn refine_replaces_parent_with_children() {
        let (mask, region) = stacked_bands();
        let small = Region::new(0, 190, 10, 10, 100);
        let refined = refine_regions(vec![small, region], &mask, &DiffConfig::default());
        assert_eq!(refined.regions.len(), 3);
        assert_eq!(refined.regions[0], small);
        assert_eq!(refined.split, 1);
        assert!(!refined.regions.contains(&region));
    }

    #[test]
    fn sparse_segments_are_discarded() {
        // The lower band holds only 40 pixels, below the segment minimum,
        // so a single child survives and the parent is kept.
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 20, 20, 180, 80);
        fill(&mut mask, 20, 170, 60, 171);
        let region = Region::new(20, 20, 160, 151, 160 * 60 + 40);
        let refined = refine_regions(vec![region], &mask, &DiffConfig::default());
        assert_eq!(refined.regions, vec![region]);
    }

    #[test]
    fn children_are_not_split_again() {
        // The upper band is itself two blocks side by side; after the row
        // split it still exceeds the trigger but stays whole.
        let mut mask = GrayImage::new(200, 200);
        fill(&mut mask, 20, 20, 90, 80);
        fill(&mut mask, 110, 20, 180, 80);
        fill(&mut mask, 20, 120, 180, 180);
        let region = Region::new(20, 20, 160, 160, 70 * 60 * 2 + 160 * 60);
        let refined = refine_regions(vec![region], &mask, &DiffConfig::default());
        assert_eq!(refined.regions.len(), 2);
        assert_eq!(
            refined.regions[0],
            Region::new(20, 20, 160, 64, 70 * 60 * 2)
        );
    }

    #[test]
    fn degenerate_crop_yields_no_children() {
        let mask = GrayImage::new(10, 10);
        let region = Region::new(10, 10, 5, 5, 25);
        assert!(split_region(&mask, region, &DiffConfig::default()).is_empty());
    }

    #[test]
    fn children_stay_inside_parent() {
        let (mask, region) = stacked_bands();
        for child in split_region(&mask, region, &DiffConfig::default()) {
            assert!(child.x >= region.x && child.right() <= region.right());
            assert!(child.y >= region.y && child.bottom() <= region.bottom());
        }
    }
}
