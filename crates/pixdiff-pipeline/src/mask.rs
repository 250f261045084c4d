//! Binary difference masks: thresholding and morphology.
//!
//! The dissimilarity magnitude is binarized, then cleaned in two steps:
//!
//! 1. An opening with a small kernel removes isolated speckle without
//!    growing real signal.
//! 2. A closing with a wider, flatter kernel reconnects pixels that
//!    belong to one visual element (glyph strokes, icon outlines) so a
//!    single component represents it.
//!
//! Masks are `GrayImage`s holding 0 (background) or 255 (foreground).
//! Pixels outside the image never take part in erosion or dilation, so
//! shapes touching the border are not eaten away.

use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::morphology::{Mask, grayscale_close, grayscale_open};

use crate::types::KernelSize;

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;

/// Mark every pixel whose magnitude is strictly greater than
/// `threshold_value` as foreground.
#[must_use = "returns the binary mask"]
pub fn binarize(magnitude: &GrayImage, threshold_value: u8) -> GrayImage {
    threshold(magnitude, threshold_value, ThresholdType::Binary)
}

/// Rectangular structuring element anchored at its centre.
///
/// Kernel extents are validated by
/// [`DiffConfig::validate`](crate::DiffConfig::validate); anything
/// larger than [`KernelSize::MAX_EXTENT`] is clamped.
#[must_use]
pub fn structuring_element(kernel: KernelSize) -> Mask {
    let width = kernel.width.clamp(1, KernelSize::MAX_EXTENT);
    let height = kernel.height.clamp(1, KernelSize::MAX_EXTENT);
    let footprint = GrayImage::from_pixel(width, height, Luma([FOREGROUND]));
    let center_x = u8::try_from(width / 2).unwrap_or(u8::MAX);
    let center_y = u8::try_from(height / 2).unwrap_or(u8::MAX);
    Mask::from_image(&footprint, center_x, center_y)
}

/// Morphological opening (erode, then dilate).
#[must_use = "returns the opened mask"]
pub fn open(mask: &GrayImage, kernel: KernelSize) -> GrayImage {
    grayscale_open(mask, &structuring_element(kernel))
}

/// Morphological closing (dilate, then erode).
#[must_use = "returns the closed mask"]
pub fn close(mask: &GrayImage, kernel: KernelSize) -> GrayImage {
    grayscale_close(mask, &structuring_element(kernel))
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    #[test]
    fn binarize_is_strictly_greater_than() {
        let magnitude = GrayImage::from_fn(3, 1, |x, _| Luma([[24, 25, 26][x as usize]]));
        let mask = binarize(&magnitude, 25);
        assert_eq!(mask.as_raw(), &vec![0, 0, FOREGROUND]);
    }

    #[test]
    fn opening_removes_isolated_pixel() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(10, 10, Luma([FOREGROUND]));
        let opened = open(&mask, KernelSize::new(3, 3));
        assert_eq!(count_foreground(&opened), 0);
    }

    #[test]
    fn opening_keeps_solid_block() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 5, 5, 15, 12);
        let opened = open(&mask, KernelSize::new(3, 3));
        assert_eq!(opened, mask);
    }

    #[test]
    fn closing_bridges_narrow_horizontal_gap() {
        // Two blocks four pixels apart: a 7-wide kernel spans the gap.
        let mut mask = GrayImage::new(40, 20);
        fill(&mut mask, 5, 5, 15, 15);
        fill(&mut mask, 19, 5, 29, 15);
        let closed = close(&mask, KernelSize::new(7, 5));
        for x in 15..19 {
            let value = closed.get_pixel(x, 10).0[0];
            assert_eq!(value, FOREGROUND, "gap at x={x}");
        }
    }

    #[test]
    fn closing_does_not_bridge_wide_gap() {
        let mut mask = GrayImage::new(50, 20);
        fill(&mut mask, 5, 5, 15, 15);
        fill(&mut mask, 30, 5, 40, 15);
        let closed = close(&mask, KernelSize::new(7, 5));
        assert_eq!(closed.get_pixel(22, 10).0[0], 0);
    }

    #[test]
    fn count_foreground_counts_nonzero() {
        let mut mask = GrayImage::new(10, 10);
        fill(&mut mask, 0, 0, 5, 1);
        assert_eq!(count_foreground(&mask), 5);
    }
}
