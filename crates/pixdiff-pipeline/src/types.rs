//! Shared types for the pixdiff region-extraction engine.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `DynamicImage` so callers can hand decoded buffers to
/// [`compute_diff`](crate::compute_diff) without depending on `image`
/// directly.
pub use image::DynamicImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of a grayscale image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned region of difference in normalized image space.
///
/// `x`/`y` are the top-left corner, `w`/`h` the extent. `area` is a
/// measured foreground pixel count associated with the region, not
/// `w * h`.
///
/// Every region emitted by the engine satisfies `w > 0`, `h > 0`,
/// `x + w <= width` and `y + h <= height` for the image it was
/// extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Left edge (pixels from the left of the image).
    pub x: u32,
    /// Top edge (pixels from the top of the image).
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
    /// Foreground pixel count attributed to this region.
    pub area: u64,
}

impl Region {
    /// Create a new region.
    #[must_use]
    pub const fn new(x: u32, y: u32, w: u32, h: u32, area: u64) -> Self {
        Self { x, y, w, h, area }
    }

    /// Exclusive right edge (`x + w`).
    #[must_use]
    pub const fn right(self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge (`y + h`).
    #[must_use]
    pub const fn bottom(self) -> u32 {
        self.y + self.h
    }

    /// Area of the bounding box (`w * h`), as opposed to the measured
    /// [`area`](Self::area).
    #[must_use]
    pub const fn box_area(self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Returns `true` if the region is non-empty and lies entirely
    /// within an image of the given dimensions.
    #[must_use]
    pub const fn fits_within(self, dimensions: Dimensions) -> bool {
        self.w > 0
            && self.h > 0
            && self.x as u64 + self.w as u64 <= dimensions.width as u64
            && self.y as u64 + self.h as u64 <= dimensions.height as u64
    }

    /// Intersection-over-union of the two bounding boxes.
    ///
    /// Returns `0.0` for disjoint or edge-touching boxes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn iou(self, other: Self) -> f64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return 0.0;
        }

        let intersection = u64::from(right - left) * u64::from(bottom - top);
        let union = self.box_area() + other.box_area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Union bounding box of two regions, with `area` summed.
    ///
    /// The summed area counts pixels twice where the two regions'
    /// foreground overlaps.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self {
            x: left,
            y: top,
            w: right - left,
            h: bottom - top,
            area: self.area.saturating_add(other.area),
        }
    }

    /// Expand the box by `padding` pixels on every side, clamped to the
    /// image bounds. `area` is carried over unchanged.
    ///
    /// Used by callers that crop region thumbnails out of the source
    /// images.
    #[must_use]
    pub fn padded(self, padding: u32, dimensions: Dimensions) -> Self {
        let left = self.x.saturating_sub(padding);
        let top = self.y.saturating_sub(padding);
        let right = self.right().saturating_add(padding).min(dimensions.width);
        let bottom = self.bottom().saturating_add(padding).min(dimensions.height);
        Self {
            x: left,
            y: top,
            w: right.saturating_sub(left),
            h: bottom.saturating_sub(top),
            area: self.area,
        }
    }
}

/// Width and height of a rectangular structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSize {
    /// Horizontal extent in pixels.
    pub width: u32,
    /// Vertical extent in pixels.
    pub height: u32,
}

impl KernelSize {
    /// Largest supported extent along either axis.
    pub const MAX_EXTENT: u32 = 255;

    /// Create a new kernel size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Tunables for one diff run.
///
/// Every threshold the engine uses lives here rather than in a global,
/// so concurrent runs with different parameters never interfere.
/// [`Default`] yields the documented values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Side of the square SSIM window. Must be odd.
    pub ssim_window: u32,

    /// Magnitude (0-255) a dissimilarity cell must exceed to be
    /// foreground.
    pub diff_threshold: u8,

    /// Structuring element of the denoising opening.
    pub open_kernel: KernelSize,

    /// Structuring element of the gap-bridging closing.
    pub close_kernel: KernelSize,

    /// Components with fewer foreground pixels are noise.
    pub min_component_area: u64,

    /// Regions whose box exceeds this fraction of the image area are
    /// split candidates.
    pub split_area_ratio: f64,

    /// A projection line is a gap when its foreground count is below
    /// this fraction of the line length.
    pub gap_density_ratio: f64,

    /// Minimum run of gap rows that splits a region horizontally.
    pub min_row_gap: u32,

    /// Minimum run of gap columns that splits a region vertically.
    pub min_col_gap: u32,

    /// A split segment needs more foreground pixels than this to
    /// become a child region.
    pub min_segment_pixels: u64,

    /// Padding added on each side of a child's tight box.
    pub segment_padding: u32,

    /// Regions overlapping an anchor by more than this `IoU` are merged
    /// into it.
    pub merge_iou_threshold: f64,

    /// Maximum number of regions returned.
    pub max_regions: usize,
}

impl DiffConfig {
    /// Default SSIM window side.
    pub const DEFAULT_SSIM_WINDOW: u32 = 7;
    /// Default dissimilarity threshold.
    pub const DEFAULT_DIFF_THRESHOLD: u8 = 25;
    /// Default opening kernel (3x3).
    pub const DEFAULT_OPEN_KERNEL: KernelSize = KernelSize::new(3, 3);
    /// Default closing kernel (7 wide, 5 tall).
    pub const DEFAULT_CLOSE_KERNEL: KernelSize = KernelSize::new(7, 5);
    /// Default minimum component area.
    pub const DEFAULT_MIN_COMPONENT_AREA: u64 = 80;
    /// Default split trigger ratio.
    pub const DEFAULT_SPLIT_AREA_RATIO: f64 = 0.15;
    /// Default gap density ratio.
    pub const DEFAULT_GAP_DENSITY_RATIO: f64 = 0.03;
    /// Default minimum horizontal gap run.
    pub const DEFAULT_MIN_ROW_GAP: u32 = 5;
    /// Default minimum vertical gap run.
    pub const DEFAULT_MIN_COL_GAP: u32 = 8;
    /// Default minimum segment foreground.
    pub const DEFAULT_MIN_SEGMENT_PIXELS: u64 = 50;
    /// Default tight-box padding.
    pub const DEFAULT_SEGMENT_PADDING: u32 = 4;
    /// Default merge `IoU` threshold.
    pub const DEFAULT_MERGE_IOU_THRESHOLD: f64 = 0.3;
    /// Default maximum region count.
    pub const DEFAULT_MAX_REGIONS: usize = 15;

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.ssim_window == 0 || self.ssim_window.is_multiple_of(2) {
            return Err(DiffError::InvalidConfig(format!(
                "ssim_window must be odd and positive, got {}",
                self.ssim_window
            )));
        }
        validate_kernel("open_kernel", self.open_kernel)?;
        validate_kernel("close_kernel", self.close_kernel)?;
        validate_ratio("split_area_ratio", self.split_area_ratio)?;
        validate_ratio("gap_density_ratio", self.gap_density_ratio)?;
        validate_ratio("merge_iou_threshold", self.merge_iou_threshold)?;
        if self.min_row_gap == 0 || self.min_col_gap == 0 {
            return Err(DiffError::InvalidConfig(
                "min_row_gap and min_col_gap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_kernel(name: &str, kernel: KernelSize) -> Result<(), DiffError> {
    let range = 1..=KernelSize::MAX_EXTENT;
    if range.contains(&kernel.width) && range.contains(&kernel.height) {
        Ok(())
    } else {
        Err(DiffError::InvalidConfig(format!(
            "{name} must be between 1x1 and {max}x{max}, got {}x{}",
            kernel.width,
            kernel.height,
            max = KernelSize::MAX_EXTENT,
        )))
    }
}

fn validate_ratio(name: &str, value: f64) -> Result<(), DiffError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DiffError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            ssim_window: Self::DEFAULT_SSIM_WINDOW,
            diff_threshold: Self::DEFAULT_DIFF_THRESHOLD,
            open_kernel: Self::DEFAULT_OPEN_KERNEL,
            close_kernel: Self::DEFAULT_CLOSE_KERNEL,
            min_component_area: Self::DEFAULT_MIN_COMPONENT_AREA,
            split_area_ratio: Self::DEFAULT_SPLIT_AREA_RATIO,
            gap_density_ratio: Self::DEFAULT_GAP_DENSITY_RATIO,
            min_row_gap: Self::DEFAULT_MIN_ROW_GAP,
            min_col_gap: Self::DEFAULT_MIN_COL_GAP,
            min_segment_pixels: Self::DEFAULT_MIN_SEGMENT_PIXELS,
            segment_padding: Self::DEFAULT_SEGMENT_PADDING,
            merge_iou_threshold: Self::DEFAULT_MERGE_IOU_THRESHOLD,
            max_regions: Self::DEFAULT_MAX_REGIONS,
        }
    }
}

/// Result of a diff run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Structural similarity as a percentage in `[0, 100]`, rounded to
    /// two decimals. `100.0` means structurally identical.
    pub similarity: f64,

    /// Differing regions, largest `area` first, at most
    /// [`DiffConfig::max_regions`] of them.
    pub regions: Vec<Region>,

    /// Dimensions of the (normalized) inputs the regions refer to.
    pub dimensions: Dimensions,
}

/// Errors that can occur while diffing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Failed to decode an input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The input buffers break the engine's contract (mismatched or
    /// zero dimensions).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Diff configuration is invalid.
    #[error("invalid diff configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `DiffError`.
#[derive(Serialize, Deserialize)]
enum DiffErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidInput(String),
    InvalidConfig(String),
}

impl Serialize for DiffError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => DiffErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => DiffErrorProxy::EmptyInput,
            Self::InvalidInput(s) => DiffErrorProxy::InvalidInput(s.clone()),
            Self::InvalidConfig(s) => DiffErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DiffError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = DiffErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            DiffErrorProxy::ImageDecode(msg) => {
                Self::InvalidInput(format!("image decode error: {msg}"))
            }
            DiffErrorProxy::EmptyInput => Self::EmptyInput,
            DiffErrorProxy::InvalidInput(s) => Self::InvalidInput(s),
            DiffErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
