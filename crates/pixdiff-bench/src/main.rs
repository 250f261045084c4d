//! pixdiff-bench: run the screenshot diff on two image files.
//!
//! Decodes a design and a build screenshot, brings them to a common size,
//! runs the region-extraction pipeline and prints the similarity score,
//! the ranked regions and, optionally, per-stage diagnostics. Useful for:
//!
//! - Tuning thresholds, kernel sizes and split parameters
//! - Measuring per-stage durations across repeated runs
//! - Producing region JSON for a consumer in either image's own pixel space
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pixdiff-bench -- [OPTIONS] <DESIGN> <BUILD>
//! ```
//!
//! Set `RUST_LOG=debug` to see the pipeline's own stage logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use pixdiff_pipeline::diagnostics::{Clock, DiffDiagnostics, compute_diff_with_diagnostics};
use pixdiff_pipeline::{
    DiffConfig, DiffResult, Dimensions, KernelSize, NormalizedPair, ResizeFilter, rank,
    scale_regions, ssim,
};
use serde::Serialize;

/// Screenshot diff with configurable parameters and diagnostics.
///
/// Compares DESIGN against BUILD and prints the similarity percentage and
/// the regions where they differ, largest first.
#[derive(Parser)]
#[command(name = "pixdiff-bench", version)]
struct Cli {
    /// Path to the design (reference) image (PNG, JPEG, BMP, WebP).
    design: PathBuf,

    /// Path to the build (implementation) image.
    build: PathBuf,

    /// Side of the square SSIM window (odd).
    #[arg(long, default_value_t = DiffConfig::DEFAULT_SSIM_WINDOW)]
    ssim_window: u32,

    /// Dissimilarity magnitude (0-255) above which a pixel differs.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_DIFF_THRESHOLD)]
    diff_threshold: u8,

    /// Opening kernel width.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_OPEN_KERNEL.width)]
    open_width: u32,

    /// Opening kernel height.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_OPEN_KERNEL.height)]
    open_height: u32,

    /// Closing kernel width.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_CLOSE_KERNEL.width)]
    close_width: u32,

    /// Closing kernel height.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_CLOSE_KERNEL.height)]
    close_height: u32,

    /// Minimum component area in pixels.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_MIN_COMPONENT_AREA)]
    min_component_area: u64,

    /// Region area, as a fraction of the image, above which a split is tried.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_SPLIT_AREA_RATIO)]
    split_area_ratio: f64,

    /// Intersection over union above which two regions are merged.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_MERGE_IOU_THRESHOLD)]
    merge_iou: f64,

    /// Maximum number of regions to report.
    #[arg(long, default_value_t = DiffConfig::DEFAULT_MAX_REGIONS)]
    max_regions: usize,

    /// Resampling filter used when the two images differ in size.
    #[arg(long, value_enum, default_value_t = Filter::Lanczos3)]
    filter: Filter,

    /// Pixel space the reported regions are expressed in.
    #[arg(long, value_enum, default_value_t = Space::Normalized)]
    original_space: Space,

    /// Only print the first N regions (e.g. 8 for hints, 12 for a fallback list).
    #[arg(long)]
    limit: Option<usize>,

    /// Full diff config as a JSON string.
    ///
    /// When provided, all other diff parameter flags are ignored.
    /// The JSON must be a valid `DiffConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    runs: usize,

    /// Print per-stage diagnostics.
    #[arg(long)]
    diagnostics: bool,

    /// Output JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Resize filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

impl From<Filter> for ResizeFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Coordinate space for reported regions.
#[derive(Clone, Copy, ValueEnum)]
enum Space {
    /// The shared size both images were resized to.
    Normalized,
    /// The design image as decoded.
    Design,
    /// The build image as decoded.
    Build,
}

impl Space {
    const fn target(self, pair: &NormalizedPair) -> Option<Dimensions> {
        match self {
            Self::Normalized => None,
            Self::Design => Some(pair.design_original),
            Self::Build => Some(pair.build_original),
        }
    }
}

/// JSON output of a single run.
#[derive(Serialize)]
struct RunOutput<'a> {
    result: &'a DiffResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a DiffDiagnostics>,
}

/// Build a [`DiffConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<DiffConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DiffConfig {
        ssim_window: cli.ssim_window,
        diff_threshold: cli.diff_threshold,
        open_kernel: KernelSize::new(cli.open_width, cli.open_height),
        close_kernel: KernelSize::new(cli.close_width, cli.close_height),
        min_component_area: cli.min_component_area,
        split_area_ratio: cli.split_area_ratio,
        merge_iou_threshold: cli.merge_iou,
        max_regions: cli.max_regions,
        ..DiffConfig::default()
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    config.validate().map_err(|e| e.to_string())?;

    let design_bytes = read_file(&cli.design)?;
    let build_bytes = read_file(&cli.build)?;
    let (design, build) = pixdiff_pipeline::decode_pair(&design_bytes, &build_bytes)
        .map_err(|e| format!("Decode error: {e}"))?;
    let pair = pixdiff_pipeline::normalize_pair(&design, &build, cli.filter.into())
        .map_err(|e| format!("Normalize error: {e}"))?;
    log::info!(
        "design {} and build {} normalized to {}",
        pair.design_original,
        pair.build_original,
        pair.dimensions(),
    );

    let (design_path, build_path) = (cli.design.display(), cli.build.display());
    eprintln!("Design: {design_path} ({})", pair.design_original);
    eprintln!("Build: {build_path} ({})", pair.build_original);
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let design_luma = ssim::to_luma(&pair.design);
    let build_luma = ssim::to_luma(&pair.build);
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (mut result, diagnostics) = compute_diff_with_diagnostics(
            design_luma.clone(),
            build_luma.clone(),
            &config,
            &StdClock,
        )
        .map_err(|e| format!("Diff error: {e}"))?;

        if let Some(target) = cli.original_space.target(&pair) {
            result.regions = scale_regions(&result.regions, result.dimensions, target);
            result.dimensions = target;
        }
        if let Some(limit) = cli.limit {
            result.regions = rank::leading(&result.regions, limit).to_vec();
        }

        if cli.json {
            let output = RunOutput {
                result: &result,
                diagnostics: cli.diagnostics.then_some(&diagnostics),
            };
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("Error serializing result: {e}"))?;
            println!("{json}");
        } else {
            print_result(&result);
            if cli.diagnostics {
                println!();
                println!("{}", diagnostics.report());
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    Ok(())
}

fn print_result(result: &DiffResult) {
    println!("Similarity: {:.2}%", result.similarity);
    println!("Dimensions: {}", result.dimensions);
    if result.regions.is_empty() {
        println!("No differing regions");
        return;
    }

    println!();
    println!(
        "{:>3}  {:>6} {:>6} {:>6} {:>6} {:>10}",
        "#", "x", "y", "w", "h", "area"
    );
    println!("{}", "-".repeat(44));
    for (i, r) in result.regions.iter().enumerate() {
        println!(
            "{:>3}  {:>6} {:>6} {:>6} {:>6} {:>10}",
            i + 1,
            r.x,
            r.y,
            r.w,
            r.h,
            r.area
        );
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&DiffDiagnostics) -> Duration;

/// Print aggregated timings across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DiffDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let mean_ms = |durations: &[f64]| durations.iter().sum::<f64>() / durations.len() as f64;

    let totals: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let min = totals.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = totals.iter().copied().reduce(f64::max).unwrap_or(0.0);
    println!(
        "Total duration: min={min:.3}ms  mean={:.3}ms  max={max:.3}ms",
        mean_ms(&totals)
    );

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stages: &[(&str, StageExtractor)] = &[
        ("Similarity", |d| d.similarity.duration),
        ("Extraction", |d| d.extraction.duration),
        ("Refinement", |d| d.refinement.duration),
        ("Merge", |d| d.merge.duration),
        ("Rank", |d| d.rank.duration),
    ];

    for (name, extractor) in stages {
        let durations: Vec<f64> = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .collect();
        println!("{name:<24} {:>10.3}ms", mean_ms(&durations));
    }
}
