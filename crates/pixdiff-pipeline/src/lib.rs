//! pixdiff-pipeline: pixel-difference region extraction (sans-IO).
//!
//! Compares a design screenshot against a build screenshot and returns a
//! similarity score plus a short, ranked list of regions where the two
//! differ visibly:
//!
//! similarity map -> threshold + morphology -> connected components ->
//! split oversized regions -> merge overlaps -> rank and truncate.
//!
//! This crate has **no I/O dependencies** -- it operates on decoded
//! in-memory buffers and returns structured data. Reading files lives in
//! `pixdiff-bench`. Every tunable is passed in a [`DiffConfig`]; the
//! engine keeps no global state, so independent diffs can run on
//! separate threads.

pub mod components;
pub mod diagnostics;
pub mod mask;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod refine;
pub mod scale;
pub mod ssim;
pub mod types;

pub use normalize::{NormalizedPair, ResizeFilter, decode_pair, normalize_pair};
pub use pipeline::Pipeline;
pub use rank::{AI_HINT_LIMIT, FALLBACK_LIMIT};
pub use scale::scale_regions;
pub use types::{
    DiffConfig, DiffError, DiffResult, Dimensions, DynamicImage, GrayImage, KernelSize, Region,
};

/// Diff two decoded images.
///
/// Both images are converted to luminance first; the inputs themselves
/// are not modified.
///
/// # Errors
///
/// Returns [`DiffError::InvalidInput`] if the images differ in size or
/// either has a zero dimension. Returns [`DiffError::InvalidConfig`] if
/// `config` fails [`DiffConfig::validate`].
pub fn compute_diff(
    design: &DynamicImage,
    build: &DynamicImage,
    config: &DiffConfig,
) -> Result<DiffResult, DiffError> {
    compute_diff_gray(ssim::to_luma(design), ssim::to_luma(build), config)
}

/// Diff two grayscale images.
///
/// # Pipeline steps
///
/// 1. SSIM map and similarity percentage
/// 2. Threshold the dissimilarity magnitude
/// 3. Opening (denoise), then closing (connect)
/// 4. Connected components above the minimum area
/// 5. Split regions larger than the area ratio at projection gaps
/// 6. Greedy `IoU` merge
/// 7. Sort by area, keep at most `max_regions`
///
/// # Errors
///
/// Same as [`compute_diff`].
pub fn compute_diff_gray(
    design: GrayImage,
    build: GrayImage,
    config: &DiffConfig,
) -> Result<DiffResult, DiffError> {
    let result = Pipeline::new(design, build, config.clone())
        .compare()?
        .extract()
        .refine()
        .merge()
        .rank()
        .into_result();
    log::debug!(
        "similarity {:.2}%, {} regions",
        result.similarity,
        result.regions.len()
    );
    Ok(result)
}
