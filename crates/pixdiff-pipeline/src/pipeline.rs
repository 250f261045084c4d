//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::compute_diff`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use pixdiff_pipeline::{DiffConfig, DiffError, GrayImage, Pipeline};
//! # fn run(design: GrayImage, build: GrayImage) -> Result<(), DiffError> {
//! let result = Pipeline::new(design, build, DiffConfig::default())
//!     .compare()?
//!     .extract()
//!     .refine()
//!     .merge()
//!     .rank()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state,
//! carrying what later stages still need. Masks are dropped once the
//! refiner has used them.

use log::debug;

use crate::components;
use crate::mask;
use crate::merge;
use crate::rank;
use crate::refine;
use crate::ssim::{self, SsimMap};
use crate::types::{DiffConfig, DiffError, DiffResult, Dimensions, GrayImage, Region};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over two grayscale buffers.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(design: GrayImage, build: GrayImage, config: DiffConfig) -> Pending {
        Pending {
            config,
            design,
            build,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .compare() to continue"]
pub struct Pending {
    config: DiffConfig,
    design: GrayImage,
    build: GrayImage,
}

impl Pending {
    /// Validate the inputs and compute the similarity map.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::InvalidConfig`] if the configuration fails
    /// [`DiffConfig::validate`]. Returns [`DiffError::InvalidInput`] if
    /// either buffer is empty or their dimensions differ.
    pub fn compare(self) -> Result<Compared, DiffError> {
        self.config.validate()?;
        let design = Dimensions::of(&self.design);
        let build = Dimensions::of(&self.build);
        if design.is_empty() || build.is_empty() {
            return Err(DiffError::InvalidInput(format!(
                "images must be non-empty, got design {design} and build {build}"
            )));
        }
        if design != build {
            return Err(DiffError::InvalidInput(format!(
                "dimension mismatch: design {design}, build {build}"
            )));
        }

        let ssim = ssim::structural_similarity(&self.design, &self.build, self.config.ssim_window);
        debug!(
            "similarity {:.2}% over {design} (window {})",
            ssim.similarity_percent(),
            ssim.window()
        );
        Ok(Compared {
            config: self.config,
            dimensions: design,
            ssim,
        })
    }
}

// ───────────────────────── Stage 1: Compared ─────────────────────────

/// Pipeline state after the similarity map has been computed.
#[must_use = "pipeline stages are consumed by advancing; call .extract() to continue"]
pub struct Compared {
    config: DiffConfig,
    dimensions: Dimensions,
    ssim: SsimMap,
}

impl Compared {
    /// The per-pixel similarity map and global score.
    #[must_use]
    pub const fn ssim(&self) -> &SsimMap {
        &self.ssim
    }

    /// Similarity percentage, rounded to two decimals.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        self.ssim.similarity_percent()
    }

    /// Threshold, denoise, connect, and extract component regions.
    pub fn extract(self) -> Extracted {
        let magnitude = self.ssim.dissimilarity().magnitude();
        let binary = mask::binarize(&magnitude, self.config.diff_threshold);
        let opened = mask::open(&binary, self.config.open_kernel);
        let closed = mask::close(&opened, self.config.close_kernel);

        let components = components::find_components(&closed);
        let component_count = components.len();
        let regions = components::retain_min_area(components, self.config.min_component_area);
        debug!(
            "{component_count} components, {} above {} px",
            regions.len(),
            self.config.min_component_area
        );

        Extracted {
            config: self.config,
            dimensions: self.dimensions,
            similarity: self.ssim.similarity_percent(),
            magnitude,
            binary,
            opened,
            closed,
            component_count,
            regions,
        }
    }
}

// ───────────────────────── Stage 2: Extracted ────────────────────────

/// Pipeline state after component extraction.
#[must_use = "pipeline stages are consumed by advancing; call .refine() to continue"]
pub struct Extracted {
    config: DiffConfig,
    dimensions: Dimensions,
    similarity: f64,
    magnitude: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
    closed: GrayImage,
    component_count: usize,
    regions: Vec<Region>,
}

impl Extracted {
    /// 8-bit dissimilarity magnitude.
    #[must_use]
    pub const fn magnitude(&self) -> &GrayImage {
        &self.magnitude
    }

    /// Thresholded mask before morphology.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Mask after the denoising opening; the refiner splits on this.
    #[must_use]
    pub const fn opened(&self) -> &GrayImage {
        &self.opened
    }

    /// Mask after the gap-bridging closing; components come from this.
    #[must_use]
    pub const fn closed(&self) -> &GrayImage {
        &self.closed
    }

    /// Components found before the area filter.
    #[must_use]
    pub const fn component_count(&self) -> usize {
        self.component_count
    }

    /// Regions that survived the area filter.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Split oversized regions at projection gaps.
    pub fn refine(self) -> Refined {
        let before = self.regions.len();
        let refinement = refine::refine_regions(self.regions, &self.opened, &self.config);
        debug!(
            "refined {before} -> {} regions ({} of {} candidates split)",
            refinement.regions.len(),
            refinement.split,
            refinement.candidates
        );
        Refined {
            config: self.config,
            dimensions: self.dimensions,
            similarity: self.similarity,
            candidates: refinement.candidates,
            split: refinement.split,
            regions: refinement.regions,
        }
    }
}

// ───────────────────────── Stage 3: Refined ──────────────────────────

/// Pipeline state after splitting oversized regions.
#[must_use = "pipeline stages are consumed by advancing; call .merge() to continue"]
pub struct Refined {
    config: DiffConfig,
    dimensions: Dimensions,
    similarity: f64,
    candidates: usize,
    split: usize,
    regions: Vec<Region>,
}

impl Refined {
    /// Regions after splitting.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of split candidates examined.
    #[must_use]
    pub const fn candidates(&self) -> usize {
        self.candidates
    }

    /// Number of candidates replaced by children.
    #[must_use]
    pub const fn split(&self) -> usize {
        self.split
    }

    /// Collapse overlapping regions.
    pub fn merge(self) -> Merged {
        let regions = merge::merge_overlapping(&self.regions, self.config.merge_iou_threshold);
        debug!("merged {} -> {} regions", self.regions.len(), regions.len());
        Merged {
            config: self.config,
            dimensions: self.dimensions,
            similarity: self.similarity,
            regions,
        }
    }
}

// ───────────────────────── Stage 4: Merged ───────────────────────────

/// Pipeline state after merging.
#[must_use = "pipeline stages are consumed by advancing; call .rank() to continue"]
pub struct Merged {
    config: DiffConfig,
    dimensions: Dimensions,
    similarity: f64,
    regions: Vec<Region>,
}

impl Merged {
    /// Regions after merging, in anchor order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Sort by area and truncate.
    pub fn rank(self) -> Ranked {
        let regions = rank::rank_regions(self.regions, self.config.max_regions);
        Ranked {
            dimensions: self.dimensions,
            similarity: self.similarity,
            regions,
        }
    }
}

// ───────────────────────── Stage 5: Ranked ───────────────────────────

/// Final pipeline state.
pub struct Ranked {
    dimensions: Dimensions,
    similarity: f64,
    regions: Vec<Region>,
}

impl Ranked {
    /// Ranked regions, largest first.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Consume the pipeline and return the result.
    #[must_use]
    pub fn into_result(self) -> DiffResult {
        DiffResult {
            similarity: self.similarity,
            regions: self.regions,
            dimensions: self.dimensions,
        }
    }
}
