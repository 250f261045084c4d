//! End-to-end scenarios for the region-extraction engine.

#![allow(clippy::unwrap_used)]

use pixdiff_pipeline::{
    DiffConfig, DiffResult, Dimensions, DynamicImage, GrayImage, Region, compute_diff,
    compute_diff_gray, merge::merge_overlapping,
};

const BASE: u8 = 128;
const ALTERED: u8 = 30;

fn flat(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, image::Luma([BASE]))
}

fn with_patches(width: u32, height: u32, patches: &[(u32, u32, u32, u32)]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = patches
            .iter()
            .any(|&(px, py, pw, ph)| x >= px && x < px + pw && y >= py && y < py + ph);
        image::Luma([if inside { ALTERED } else { BASE }])
    })
}

/// Deterministic noise: a linear congruential generator per image.
fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut state = seed;
    GrayImage::from_fn(width, height, |_, _| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        image::Luma([(state >> 56) as u8])
    })
}

fn assert_well_formed(result: &DiffResult, config: &DiffConfig) {
    assert!((0.0..=100.0).contains(&result.similarity));
    assert!(result.regions.len() <= config.max_regions);
    for region in &result.regions {
        assert!(
            region.fits_within(result.dimensions),
            "{region:?} escapes {}",
            result.dimensions
        );
    }
    for pair in result.regions.windows(2) {
        assert!(pair[0].area >= pair[1].area, "not sorted: {pair:?}");
    }
}

#[test]
fn identical_buffers_are_fully_similar() {
    let img = noise(120, 90, 42);
    let result = compute_diff_gray(img.clone(), img, &DiffConfig::default()).unwrap();
    assert!((result.similarity - 100.0).abs() < f64::EPSILON);
    assert!(result.regions.is_empty());
}

#[test]
fn altered_left_half_yields_one_dominant_region() {
    let design = flat(100, 100);
    let build = with_patches(100, 100, &[(0, 0, 50, 100)]);
    let result = compute_diff_gray(design, build, &DiffConfig::default()).unwrap();

    assert!(result.similarity < 100.0);
    assert!(!result.regions.is_empty());
    let top = result.regions[0];
    assert!(top.x <= 3 && top.y <= 3, "{top:?}");
    assert!(top.w.abs_diff(50) <= 6, "{top:?}");
    assert!(top.h.abs_diff(100) <= 3, "{top:?}");
}

#[test]
fn opposite_corner_patches_yield_two_regions() {
    let design = flat(200, 200);
    let build = with_patches(200, 200, &[(10, 10, 20, 20), (170, 170, 20, 20)]);
    let result = compute_diff_gray(design, build, &DiffConfig::default()).unwrap();

    assert_eq!(result.regions.len(), 2, "{:?}", result.regions);
    let (a, b) = (result.regions[0], result.regions[1]);
    assert!(a.iou(b).abs() < f64::EPSILON);
    // Equal patches: equal areas.
    assert_eq!(a.area, b.area);
}

#[test]
fn diff_is_symmetric() {
    let design = flat(120, 120);
    let build = with_patches(120, 120, &[(10, 20, 30, 15), (70, 60, 25, 40)]);
    let config = DiffConfig::default();
    let ab = compute_diff_gray(design.clone(), build.clone(), &config).unwrap();
    let ba = compute_diff_gray(build, design, &config).unwrap();
    assert_eq!(ab, ba);
}

#[test]
fn random_pairs_produce_well_formed_regions() {
    let config = DiffConfig::default();
    for seed in 0..6 {
        let width = 40 + 23 * seed as u32;
        let height = 30 + 17 * seed as u32;
        let design = noise(width, height, seed);
        let build = noise(width, height, seed + 100);
        let result = compute_diff_gray(design, build, &config).unwrap();
        assert_eq!(result.dimensions, Dimensions::new(width, height));
        assert_well_formed(&result, &config);
    }
}

#[test]
fn many_patches_are_truncated_to_max_regions() {
    // A 6x6 grid of separated patches: 36 candidates, 15 kept.
    let patches: Vec<(u32, u32, u32, u32)> = (0..6)
        .flat_map(|row| (0..6).map(move |col| (10 + col * 40, 10 + row * 40, 14 + col, 14)))
        .collect();
    let design = flat(250, 250);
    let build = with_patches(250, 250, &patches);
    let config = DiffConfig::default();
    let result = compute_diff_gray(design, build, &config).unwrap();

    assert_eq!(result.regions.len(), 15);
    assert_well_formed(&result, &config);
}

#[test]
fn max_regions_is_configurable() {
    let design = flat(200, 200);
    let build = with_patches(200, 200, &[(10, 10, 20, 20), (170, 170, 20, 20)]);
    let config = DiffConfig {
        max_regions: 1,
        ..DiffConfig::default()
    };
    let result = compute_diff_gray(design, build, &config).unwrap();
    assert_eq!(result.regions.len(), 1);
}

#[test]
fn tiny_noise_below_min_area_is_ignored() {
    let design = flat(100, 100);
    let build = with_patches(100, 100, &[(50, 50, 1, 1)]);
    let result = compute_diff_gray(design, build, &DiffConfig::default()).unwrap();
    assert!(result.regions.is_empty());
}

#[test]
fn merge_output_is_stable_on_typical_results() {
    let design = flat(160, 160);
    let build = with_patches(
        160,
        160,
        &[(10, 10, 30, 10), (10, 60, 60, 20), (100, 100, 40, 40)],
    );
    let config = DiffConfig::default();
    let result = compute_diff_gray(design, build, &config).unwrap();
    let remerged = merge_overlapping(&result.regions, config.merge_iou_threshold);
    assert_eq!(remerged, result.regions);
}

#[test]
fn concurrent_runs_do_not_interfere() {
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            std::thread::spawn(move || {
                let design = flat(80, 80);
                let build = with_patches(80, 80, &[(5 + i * 10, 5, 12, 12)]);
                let config = DiffConfig {
                    max_regions: 1 + i as usize,
                    ..DiffConfig::default()
                };
                compute_diff_gray(design, build, &config).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().unwrap();
        assert_eq!(result.regions.len(), 1);
        let region: Region = result.regions[0];
        assert!(region.x <= 5 + 10 * i as u32);
    }
}

#[test]
fn decoded_images_go_through_compute_diff() {
    let design = DynamicImage::ImageLuma8(flat(64, 64));
    let build = DynamicImage::ImageLuma8(with_patches(64, 64, &[(20, 20, 16, 16)]));
    let result = compute_diff(&design, &build, &DiffConfig::default()).unwrap();
    assert_eq!(result.regions.len(), 1);
    // The original buffers are untouched.
    assert!(design.to_luma8().pixels().all(|p| p.0[0] == BASE));
}

#[test]
fn difference_inside_a_changed_ring_is_not_reported_separately() {
    // A 5 px thick 80x80 ring with an unrelated blob in its hole.
    let design = flat(200, 200);
    let build = with_patches(
        200,
        200,
        &[
            (40, 40, 80, 5),
            (40, 115, 80, 5),
            (40, 45, 5, 70),
            (115, 45, 5, 70),
            (73, 73, 14, 14),
        ],
    );
    let result = compute_diff_gray(design, build, &DiffConfig::default()).unwrap();

    assert_eq!(result.regions.len(), 1, "{:?}", result.regions);
    let ring = result.regions[0];
    assert!(ring.x <= 40 && ring.y <= 40, "{ring:?}");
    assert!(ring.right() >= 120 && ring.bottom() >= 120, "{ring:?}");
}

#[test]
fn faint_color_change_is_detected() {
    let design = DynamicImage::ImageRgb8(image::RgbImage::new(100, 100));
    let build = DynamicImage::ImageRgb8(image::RgbImage::from_fn(100, 100, |x, y| {
        if (20..60).contains(&x) && (20..60).contains(&y) {
            image::Rgb([0, 0, 6])
        } else {
            image::Rgb([0, 0, 0])
        }
    }));
    let result = compute_diff(&design, &build, &DiffConfig::default()).unwrap();

    assert!(result.similarity < 100.0);
    assert_eq!(result.regions.len(), 1, "{:?}", result.regions);
    let patch = result.regions[0];
    assert!(patch.x >= 15 && patch.y >= 15, "{patch:?}");
    assert!(patch.right() <= 65 && patch.bottom() <= 65, "{patch:?}");
}
