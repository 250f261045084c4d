//! Structural similarity between two grayscale buffers.
//!
//! Computes the SSIM index with a uniform square window, producing a
//! per-pixel similarity map and a scalar score. The map is turned into
//! a [`DissimilarityMap`] that the region extractor thresholds.
//!
//! Local statistics use a sample-covariance normalisation
//! (`N / (N - 1)` for an `N`-pixel window) and mirror the image at its
//! borders (`d c b a | a b c d | d c b a`), so every pixel gets a full
//! window. The global score averages the map with a border of half a
//! window cropped away.
//!
//! Every formula is symmetric in its two inputs, so swapping design and
//! build yields a bit-identical map.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// A single-channel `f32` raster.
pub type FloatMap = ImageBuffer<Luma<f32>, Vec<f32>>;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// BT.601 luma weights in 14-bit fixed point (sum is `1 << 14`).
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Convert a decoded image to single-channel luminance.
///
/// Uses BT.601 weights (`0.299 R + 0.587 G + 0.114 B`), rounded in
/// fixed point; alpha is ignored. 8-bit grayscale input is copied as is.
/// The input is left untouched; a new buffer is returned.
#[must_use = "returns the luminance image"]
pub fn to_luma(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([bt601(r, g, b)])
    })
}

#[allow(clippy::cast_possible_truncation)]
fn bt601(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B;
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Per-pixel SSIM map together with its global score.
#[derive(Debug, Clone)]
pub struct SsimMap {
    map: FloatMap,
    score: f64,
    window: u32,
}

impl SsimMap {
    /// Per-pixel similarity in `[-1, 1]`.
    #[must_use]
    pub const fn map(&self) -> &FloatMap {
        &self.map
    }

    /// Mean similarity over the cropped interior.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Window side actually used (may be smaller than requested for
    /// tiny images).
    #[must_use]
    pub const fn window(&self) -> u32 {
        self.window
    }

    /// Score as a percentage in `[0, 100]`, rounded to two decimals.
    #[must_use]
    pub fn similarity_percent(&self) -> f64 {
        let percent = (self.score * 100.0).clamp(0.0, 100.0);
        (percent * 100.0).round() / 100.0
    }

    /// Per-pixel dissimilarity `clamp(|1 - s|, 0, 1)`.
    #[must_use]
    pub fn dissimilarity(&self) -> DissimilarityMap {
        let (width, height) = self.map.dimensions();
        let values = FloatMap::from_fn(width, height, |x, y| {
            Luma([(1.0 - self.map.get_pixel(x, y).0[0]).abs().min(1.0)])
        });
        DissimilarityMap(values)
    }
}

/// Dense dissimilarity magnitudes in `[0, 1]`, one per pixel.
#[derive(Debug, Clone)]
pub struct DissimilarityMap(FloatMap);

impl DissimilarityMap {
    /// Raw values in `[0, 1]`.
    #[must_use]
    pub const fn values(&self) -> &FloatMap {
        &self.0
    }

    /// Scale to an 8-bit magnitude: `clamp(255 * v, 0, 255)`, truncated.
    #[must_use = "returns the magnitude image"]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn magnitude(&self) -> GrayImage {
        let (width, height) = self.0.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let v = f64::from(self.0.get_pixel(x, y).0[0]);
            Luma([(v * DATA_RANGE).clamp(0.0, DATA_RANGE) as u8])
        })
    }
}

/// Compute the SSIM map of two equally sized grayscale images.
///
/// `window` is the requested (odd) window side. It shrinks to the
/// largest odd size that fits when an image is smaller than the window.
///
/// Both images must have the same dimensions; the caller checks this.
#[must_use = "returns the similarity map"]
pub fn structural_similarity(a: &GrayImage, b: &GrayImage, window: u32) -> SsimMap {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    let window = effective_window(window, width, height);
    let radius = (window / 2) as usize;
    let (w, h) = (width as usize, height as usize);

    let xs: Vec<f64> = a.as_raw().iter().copied().map(f64::from).collect();
    let ys: Vec<f64> = b.as_raw().iter().copied().map(f64::from).collect();
    let xx: Vec<f64> = xs.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = ys.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = xs.iter().zip(&ys).map(|(p, q)| p * q).collect();

    let ux = box_mean(&xs, w, h, radius);
    let uy = box_mean(&ys, w, h, radius);
    let uxx = box_mean(&xx, w, h, radius);
    let uyy = box_mean(&yy, w, h, radius);
    let uxy = box_mean(&xy, w, h, radius);

    let samples = f64::from(window * window);
    let cov_norm = if window > 1 {
        samples / (samples - 1.0)
    } else {
        1.0
    };
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    // Fused multiply-add would round differently for (a, b) and (b, a).
    #[allow(clippy::suboptimal_flops)]
    let values: Vec<f64> = (0..w * h)
        .map(|i| {
            let (mx, my) = (ux[i], uy[i]);
            let vx = cov_norm * (uxx[i] - mx * mx);
            let vy = cov_norm * (uyy[i] - my * my);
            let vxy = cov_norm * (uxy[i] - mx * my);

            let a1 = 2.0 * mx * my + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = mx * mx + my * my + c1;
            let b2 = vx + vy + c2;
            (a1 * a2) / (b1 * b2)
        })
        .collect();

    let score = cropped_mean(&values, w, h, radius);

    #[allow(clippy::cast_possible_truncation)]
    let map = FloatMap::from_raw(width, height, values.iter().map(|&v| v as f32).collect())
        .unwrap_or_else(|| FloatMap::new(width, height));

    SsimMap { map, score, window }
}

/// Largest odd window no bigger than `requested` or either image side.
fn effective_window(requested: u32, width: u32, height: u32) -> u32 {
    let side = requested.min(width).min(height).max(1);
    if side.is_multiple_of(2) {
        side - 1
    } else {
        side
    }
}

/// Mirror an out-of-range index back into `0..len`.
const fn reflect(index: isize, len: usize) -> usize {
    let len = len.cast_signed();
    let period = 2 * len;
    let m = index.rem_euclid(period);
    let folded = if m < len { m } else { period - 1 - m };
    folded.cast_unsigned()
}

/// Separable uniform filter: mean over a `(2r+1)^2` window.
#[allow(clippy::cast_precision_loss)]
fn box_mean(values: &[f64], width: usize, height: usize, radius: usize) -> Vec<f64> {
    let r = radius.cast_signed();
    let side = 2 * radius + 1;

    let mut horizontal = vec![0.0; values.len()];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        for x in 0..width {
            let start = x.cast_signed() - r;
            let sum: f64 = (0..side.cast_signed())
                .map(|k| row[reflect(start + k, width)])
                .sum();
            horizontal[y * width + x] = sum;
        }
    }

    let norm = (side * side) as f64;
    let mut out = vec![0.0; values.len()];
    for y in 0..height {
        let start = y.cast_signed() - r;
        for x in 0..width {
            let sum: f64 = (0..side.cast_signed())
                .map(|k| horizontal[reflect(start + k, height) * width + x])
                .sum();
            out[y * width + x] = sum / norm;
        }
    }
    out
}

/// Mean over the interior `[r, len - r)` on both axes, or the whole
/// map if the interior is empty.
#[allow(clippy::cast_precision_loss)]
fn cropped_mean(values: &[f64], width: usize, height: usize, radius: usize) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    if width <= 2 * radius || height <= 2 * radius {
        return values.iter().sum::<f64>() / values.len() as f64;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for y in radius..height - radius {
        for x in radius..width - radius {
            sum += values[y * width + x];
            count += 1;
        }
    }
    sum / count as f64
}
