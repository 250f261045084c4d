//! Map regions from normalized space back to an original image.
//!
//! Each axis scales independently: `sx = original.width / normalized.width`
//! and `sy = original.height / normalized.height`. Geometry is floored;
//! `area` is scaled by `sx * sy`.

use crate::types::{Dimensions, Region};

/// Scale regions from `normalized` coordinates into `original` ones.
///
/// Returns the regions unchanged when both sizes match or when
/// `normalized` is empty.
#[must_use = "returns the scaled regions"]
pub fn scale_regions(
    regions: &[Region],
    normalized: Dimensions,
    original: Dimensions,
) -> Vec<Region> {
    if normalized == original || normalized.is_empty() {
        return regions.to_vec();
    }

    let sx = f64::from(original.width) / f64::from(normalized.width);
    let sy = f64::from(original.height) / f64::from(normalized.height);
    regions.iter().map(|&r| scale_region(r, sx, sy)).collect()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale_region(region: Region, sx: f64, sy: f64) -> Region {
    let floor_u32 = |v: f64| v.floor() as u32;
    Region {
        x: floor_u32(f64::from(region.x) * sx),
        y: floor_u32(f64::from(region.y) * sy),
        w: floor_u32(f64::from(region.w) * sx),
        h: floor_u32(f64::from(region.h) * sy),
        area: (region.area as f64 * sx * sy).floor() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_sizes_match() {
        let regions = vec![Region::new(1, 2, 3, 4, 5)];
        let dims = Dimensions::new(100, 100);
        assert_eq!(scale_regions(&regions, dims, dims), regions);
    }

    #[test]
    fn axes_scale_independently() {
        let regions = vec![Region::new(10, 10, 20, 5, 100)];
        let scaled = scale_regions(&regions, Dimensions::new(100, 50), Dimensions::new(200, 75));
        assert_eq!(scaled, vec![Region::new(20, 15, 40, 7, 300)]);
    }

    #[test]
    fn scaled_regions_stay_inside_original() {
        let normalized = Dimensions::new(300, 200);
        let original = Dimensions::new(1170, 2532);
        let region = Region::new(250, 150, 50, 50, 1000);
        let scaled = scale_regions(&[region], normalized, original);
        assert!(scaled[0].fits_within(original));
    }
}
