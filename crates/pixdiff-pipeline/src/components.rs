//! Connected-component extraction: binary mask in, candidate regions out.
//!
//! Labels 8-connected foreground components with
//! [`imageproc::region_labelling::connected_components`] and reduces
//! each label to its bounding box and pixel count.
//!
//! Only *external* components are kept: a component lying inside a
//! hole of another one is dropped, as outer-border tracing would never
//! reach it. Outermost borders come from
//! [`imageproc::contours::find_contours`] (Suzuki-Abe); each one names
//! the label of the component it encloses.

use std::collections::HashSet;

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::Region;

/// Running bounds of one labelled component.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: u64,
}

impl Bounds {
    const fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixels: 0,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.pixels += 1;
    }

    const fn to_region(self) -> Region {
        Region::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
            self.pixels,
        )
    }
}

/// Every external 8-connected foreground component as a region.
///
/// `area` is the component's pixel count. Regions come out in label
/// order, i.e. by the raster position of each component's first pixel.
/// Components nested in another component's hole are not reported.
#[must_use = "returns the component regions"]
pub fn find_components(mask: &GrayImage) -> Vec<Region> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let outermost: HashSet<u32> = find_contours::<u32>(mask)
        .iter()
        .filter(|c| is_outermost(c))
        .filter_map(|c| c.points.first())
        .map(|p| labels.get_pixel(p.x, p.y).0[0])
        .collect();

    let mut bounds: Vec<Option<Bounds>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 || !outermost.contains(&label) {
            continue;
        }
        let label = label as usize;
        if bounds.len() < label {
            bounds.resize(label, None);
        }
        let entry = bounds[label - 1].get_or_insert_with(|| Bounds::new(x, y));
        entry.include(x, y);
    }

    bounds
        .into_iter()
        .flatten()
        .map(Bounds::to_region)
        .collect()
}

/// An outer border with no enclosing hole border.
const fn is_outermost(contour: &Contour<u32>) -> bool {
    matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none()
}

/// Keep the components with at least `min_area` foreground pixels.
#[must_use = "returns the surviving regions"]
pub fn retain_min_area(mut components: Vec<Region>, min_area: u64) -> Vec<Region> {
    components.retain(|r| r.area >= min_area);
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_has_no_components() {
        let mask = GrayImage::new(10, 10);
        assert!(find_components(&mask).is_empty());
    }

    #[test]
    fn separate_blocks_become_separate_regions() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 2, 3, 12, 8);
        fill(&mut mask, 20, 25, 30, 35);
        let regions = find_components(&mask);
        assert_eq!(
            regions,
            vec![
                Region::new(2, 3, 10, 5, 50),
                Region::new(20, 25, 10, 10, 100),
            ]
        );
    }

    #[test]
    fn diagonal_neighbours_are_connected() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 2, Luma([255]));
        mask.put_pixel(3, 3, Luma([255]));
        assert_eq!(find_components(&mask), vec![Region::new(1, 1, 3, 3, 3)]);
    }

    #[test]
    fn area_is_pixel_count_not_box_area() {
        // An L shape: 10 pixels across the top, 9 more down the left.
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, 0, 0, 10, 1);
        fill(&mut mask, 0, 1, 1, 10);
        let regions = find_components(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].box_area(), 100);
        assert_eq!(regions[0].area, 19);
    }

    #[test]
    fn component_inside_a_hole_is_dropped() {
        // A 5 px thick square ring with a separate blob in its hole.
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 10, 10, 90, 15);
        fill(&mut mask, 10, 85, 90, 90);
        fill(&mut mask, 10, 15, 15, 85);
        fill(&mut mask, 85, 15, 90, 85);
        fill(&mut mask, 40, 40, 54, 54);
        assert_eq!(
            find_components(&mask),
            vec![Region::new(10, 10, 80, 80, 80 * 80 - 70 * 70)]
        );
    }

    #[test]
    fn blob_beside_a_ring_is_kept() {
        let mut mask = GrayImage::new(100, 60);
        fill(&mut mask, 0, 0, 30, 3);
        fill(&mut mask, 0, 27, 30, 30);
        fill(&mut mask, 0, 3, 3, 27);
        fill(&mut mask, 27, 3, 30, 27);
        fill(&mut mask, 50, 10, 60, 20);
        let regions = find_components(&mask);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1], Region::new(50, 10, 10, 10, 100));
    }

    #[test]
    fn small_components_are_filtered() {
        let mut mask = GrayImage::new(60, 60);
        fill(&mut mask, 0, 0, 8, 10); // 80 pixels: kept
        fill(&mut mask, 30, 30, 39, 38); // 72 pixels: noise
        let regions = retain_min_area(find_components(&mask), 80);
        assert_eq!(regions, vec![Region::new(0, 0, 8, 10, 80)]);
    }
}
