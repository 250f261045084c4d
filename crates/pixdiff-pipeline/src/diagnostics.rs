//! Pipeline diagnostics: timing and counts for each stage.
//!
//! Every call to [`compute_diff_with_diagnostics`] collects these
//! alongside the diff result. They exist for threshold tuning and
//! performance work, not for the result contract.
//!
//! Time is read through the [`Clock`] trait so the library itself never
//! touches a platform timer; the bench CLI supplies a
//! `std::time::Instant`-backed clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mask;
use crate::pipeline::Pipeline;
use crate::types::{DiffConfig, DiffError, DiffResult, GrayImage};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Injectable time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single diff run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffDiagnostics {
    /// Stage 1: similarity map.
    pub similarity: StageDiagnostics,
    /// Stage 2: thresholding, morphology, components.
    pub extraction: StageDiagnostics,
    /// Stage 3: splitting oversized regions.
    pub refinement: StageDiagnostics,
    /// Stage 4: `IoU` merge.
    pub merge: StageDiagnostics,
    /// Stage 5: sort and truncate.
    pub rank: StageDiagnostics,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: DiffSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Similarity mapping.
    Similarity {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Window side actually used.
        window: u32,
        /// Similarity percentage.
        similarity: f64,
    },
    /// Region extraction.
    Extraction {
        /// Magnitude threshold.
        threshold: u8,
        /// Foreground pixels after thresholding.
        binary_pixels: u64,
        /// Foreground pixels after the opening.
        opened_pixels: u64,
        /// Foreground pixels after the closing.
        closed_pixels: u64,
        /// Components found.
        component_count: usize,
        /// Components above the area minimum.
        region_count: usize,
    },
    /// Region refinement.
    Refinement {
        /// Regions entering the stage.
        regions_before: usize,
        /// Regions leaving the stage.
        regions_after: usize,
        /// Regions over the area ratio.
        candidates: usize,
        /// Candidates replaced by children.
        split: usize,
    },
    /// Region merge.
    Merge {
        /// `IoU` threshold.
        iou_threshold: f64,
        /// Regions entering the stage.
        regions_before: usize,
        /// Regions leaving the stage.
        regions_after: usize,
    },
    /// Ranking.
    Rank {
        /// Output bound.
        max_regions: usize,
        /// Regions entering the stage.
        regions_before: usize,
        /// Regions leaving the stage.
        regions_after: usize,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Similarity percentage.
    pub similarity: f64,
    /// Regions emitted.
    pub region_count: usize,
}

/// Run the diff while timing every stage.
///
/// # Errors
///
/// Same as [`crate::compute_diff_gray`].
pub fn compute_diff_with_diagnostics<C: Clock>(
    design: GrayImage,
    build: GrayImage,
    config: &DiffConfig,
    clock: &C,
) -> Result<(DiffResult, DiffDiagnostics), DiffError> {
    let total_start = clock.now();

    let start = clock.now();
    let compared = Pipeline::new(design, build, config.clone()).compare()?;
    let ssim = compared.ssim();
    let (width, height) = ssim.map().dimensions();
    let similarity = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Similarity {
            width,
            height,
            window: ssim.window(),
            similarity: compared.similarity(),
        },
    };

    let start = clock.now();
    let extracted = compared.extract();
    let extraction = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Extraction {
            threshold: config.diff_threshold,
            binary_pixels: mask::count_foreground(extracted.binary()),
            opened_pixels: mask::count_foreground(extracted.opened()),
            closed_pixels: mask::count_foreground(extracted.closed()),
            component_count: extracted.component_count(),
            region_count: extracted.regions().len(),
        },
    };

    let start = clock.now();
    let regions_before = extracted.regions().len();
    let refined = extracted.refine();
    let refinement = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Refinement {
            regions_before,
            regions_after: refined.regions().len(),
            candidates: refined.candidates(),
            split: refined.split(),
        },
    };

    let start = clock.now();
    let regions_before = refined.regions().len();
    let merged = refined.merge();
    let merge = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Merge {
            iou_threshold: config.merge_iou_threshold,
            regions_before,
            regions_after: merged.regions().len(),
        },
    };

    let start = clock.now();
    let regions_before = merged.regions().len();
    let ranked = merged.rank();
    let rank = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Rank {
            max_regions: config.max_regions,
            regions_before,
            regions_after: ranked.regions().len(),
        },
    };

    let result = ranked.into_result();
    let diagnostics = DiffDiagnostics {
        similarity,
        extraction,
        refinement,
        merge,
        rank,
        total_duration: clock.elapsed(&total_start),
        summary: DiffSummary {
            image_width: result.dimensions.width,
            image_height: result.dimensions.height,
            pixel_count: result.dimensions.pixel_count(),
            similarity: result.similarity,
            region_count: result.regions.len(),
        },
    };
    Ok((result, diagnostics))
}

impl DiffDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Diff Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Similarity", &self.similarity),
            ("Extraction", &self.extraction),
            ("Refinement", &self.refinement),
            ("Merge", &self.merge),
            ("Rank", &self.rank),
        ];
        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Similarity: {:.2}%  |  Regions: {}",
            self.summary.similarity, self.summary.region_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
const fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Similarity {
            width,
            height,
            window,
            similarity,
        } => format!("{width}x{height} window={window} score={similarity:.2}%"),
        StageMetrics::Extraction {
            threshold,
            binary_pixels,
            opened_pixels,
            closed_pixels,
            component_count,
            region_count,
        } => {
            format!(
                "thr={threshold} px={binary_pixels}->{opened_pixels}->{closed_pixels} components={component_count} kept={region_count}",
            )
        }
        StageMetrics::Refinement {
            regions_before,
            regions_after,
            candidates,
            split,
        } => {
            format!(
                "{regions_before}->{regions_after} regions, {split}/{candidates} split"
            )
        }
        StageMetrics::Merge {
            iou_threshold,
            regions_before,
            regions_after,
        } => {
            format!(
                "iou>{iou_threshold:.2} {regions_before}->{regions_after} regions"
            )
        }
        StageMetrics::Rank {
            max_regions,
            regions_before,
            regions_after,
        } => {
            format!(
                "max={max_regions} {regions_before}->{regions_after} regions"
            )
        }
    }
}
