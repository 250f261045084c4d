//! Input normalization: decode two screenshots and bring them to a
//! common size.
//!
//! The diff engine requires equal dimensions. Both images are resized to
//! the per-axis minimum of the two (aspect ratio is not preserved), and
//! the original sizes are kept so regions can later be mapped back with
//! [`crate::scale::scale_regions`].
//!
//! This sits in front of the engine and is optional: callers that
//! already hold equal-sized buffers go straight to
//! [`crate::compute_diff`].

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::{DiffError, Dimensions};

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Two images resized to a shared size, plus their original sizes.
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    /// Resized design image.
    pub design: DynamicImage,
    /// Resized build image.
    pub build: DynamicImage,
    /// Design size before resizing.
    pub design_original: Dimensions,
    /// Build size before resizing.
    pub build_original: Dimensions,
}

impl NormalizedPair {
    /// Shared size of both images.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.design.width(), self.design.height())
    }
}

/// Decode two encoded images (PNG, JPEG, BMP, WebP).
///
/// # Errors
///
/// Returns [`DiffError::EmptyInput`] if either slice is empty.
/// Returns [`DiffError::ImageDecode`] if either image is unrecognized
/// or corrupt.
pub fn decode_pair(design: &[u8], build: &[u8]) -> Result<(DynamicImage, DynamicImage), DiffError> {
    if design.is_empty() || build.is_empty() {
        return Err(DiffError::EmptyInput);
    }
    let design = image::load_from_memory(design)?;
    let build = image::load_from_memory(build)?;
    Ok((design, build))
}

/// Resize both images to `(min(widths), min(heights))`.
///
/// An image already at the target size is cloned rather than resampled.
///
/// # Errors
///
/// Returns [`DiffError::InvalidInput`] if either image has a zero
/// dimension.
pub fn normalize_pair(
    design: &DynamicImage,
    build: &DynamicImage,
    filter: ResizeFilter,
) -> Result<NormalizedPair, DiffError> {
    let design_original = Dimensions::new(design.width(), design.height());
    let build_original = Dimensions::new(build.width(), build.height());
    if design_original.is_empty() || build_original.is_empty() {
        return Err(DiffError::InvalidInput(format!(
            "cannot normalize empty image (design {design_original}, build {build_original})"
        )));
    }

    let target = Dimensions::new(
        design_original.width.min(build_original.width),
        design_original.height.min(build_original.height),
    );

    Ok(NormalizedPair {
        design: resize_to(design, target, filter),
        build: resize_to(build, target, filter),
        design_original,
        build_original,
    })
}

fn resize_to(image: &DynamicImage, target: Dimensions, filter: ResizeFilter) -> DynamicImage {
    if image.width() == target.width && image.height() == target.height {
        return image.clone();
    }
    image.resize_exact(target.width, target.height, filter.to_image_filter())
}
