//! Image conditioning: turn a noisy, possibly rotated, unevenly lit label
//! photo into a bitmap OCR can read, with no per-image manual tuning.
//!
//! ## Degradation contract
//!
//! Five transforms run in a fixed order. Each stage catches its own failure
//! (including panics from the numeric code underneath) and passes through
//! the best image it has, so a single bad stage never costs the run — an
//! unsharpenable image still gets denoised, a label without detectable
//! lines simply skips rotation.
//!
//! ## Stage order
//!
//! 1. **Contrast** — CLAHE on luma (clip 2.0, 8×8 tiles). Labels are lit
//!    unevenly; global equalisation would blow out the bright half while
//!    adaptive local equalisation lifts the dark half.
//! 2. **Brightness** — mean-luma nudge toward 128, with fixed corrections
//!    for very dark (+50) and very bright (−30) photos.
//! 3. **Rotation** — Canny edges, Hough lines within ±45°, median of the
//!    first 10 angles; rotate by the negative median only when the skew
//!    exceeds 2°, expanding the canvas with white so corners survive.
//! 4. **Denoise** — bilateral filtering (9, 75, 75) per channel; edge
//!    preservation matters because text *is* edges.
//! 5. **Sharpen** — fixed 3×3 unsharp kernel to restore the contrast the
//!    denoiser took.
//!
//! Runs inside `spawn_blocking`: the transforms are CPU-bound and would
//! stall Tokio worker threads.

use crate::error::{StageError, WeightOcrError};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::{bilateral_filter, filter3x3};
use imageproc::geometric_transformations::{rotate, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Restore contrast lost in denoising.
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Whether the conditioned output stays grayscale or carries color channels.
///
/// Decided once from the input; every stage converts back into this family
/// so the conditioner's output is always in the input's encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorFamily {
    Luma,
    Color,
}

fn family_of(image: &DynamicImage) -> ColorFamily {
    if image.color().has_color() {
        ColorFamily::Color
    } else {
        ColorFamily::Luma
    }
}

/// Condition an image for OCR. Never fails on image content; the only error
/// path is the blocking task itself being unable to run.
pub async fn condition(image: DynamicImage) -> Result<DynamicImage, WeightOcrError> {
    tokio::task::spawn_blocking(move || condition_blocking(image))
        .await
        .map_err(|e| WeightOcrError::Internal(format!("conditioning task failed: {e}")))
}

/// Blocking implementation of the five-stage pipeline.
pub fn condition_blocking(image: DynamicImage) -> DynamicImage {
    type Stage = fn(&DynamicImage, ColorFamily) -> Result<DynamicImage, StageError>;
    const STAGES: [(&str, Stage); 5] = [
        ("contrast", enhance_contrast),
        ("brightness", normalize_brightness),
        ("rotation", correct_rotation),
        ("denoise", reduce_noise),
        ("sharpen", sharpen),
    ];

    let family = family_of(&image);
    let mut current = image;
    for (name, stage) in STAGES {
        match catch_unwind(AssertUnwindSafe(|| stage(&current, family))) {
            Ok(Ok(next)) => {
                debug!(stage = name, "conditioning stage applied");
                current = next;
            }
            Ok(Err(e)) => {
                warn!(stage = name, error = %e, "conditioning stage failed, keeping previous image");
            }
            Err(_) => {
                warn!(stage = name, "conditioning stage panicked, keeping previous image");
            }
        }
    }
    current
}

/// Re-wrap a processed luma plane in the pipeline's color family.
fn in_family(gray: GrayImage, family: ColorFamily) -> DynamicImage {
    match family {
        ColorFamily::Luma => DynamicImage::ImageLuma8(gray),
        ColorFamily::Color => DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()),
    }
}

// ── Stage 1: adaptive contrast ───────────────────────────────────────────

fn enhance_contrast(image: &DynamicImage, family: ColorFamily) -> Result<DynamicImage, StageError> {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(StageError::new("contrast", "empty image"));
    }
    Ok(in_family(clahe(&gray, 2.0, 8, 8), family))
}

/// Contrast-limited adaptive histogram equalisation on an 8-bit luma plane.
///
/// Per-tile histograms are clipped at `clip_limit` times the uniform bin
/// height, the excess redistributed evenly, and each pixel is mapped through
/// a bilinear blend of the four surrounding tile LUTs so tile seams do not
/// show up as blocking artifacts.
fn clahe(gray: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let tiles_x = tiles_x.min(w).max(1);
    let tiles_y = tiles_y.min(h).max(1);

    // One equalisation LUT per tile.
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * w / tiles_x;
            let x1 = (tx + 1) * w / tiles_x;
            let y0 = ty * h / tiles_y;
            let y1 = (ty + 1) * h / tiles_y;

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let tile_pixels = ((x1 - x0) * (y1 - y0)) as f32;
            let limit = ((clip_limit * tile_pixels) / 256.0).max(1.0) as u32;
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            for bin in hist.iter_mut() {
                *bin += bonus;
            }

            let total: u32 = hist.iter().sum();
            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cdf = 0u32;
            for (value, &count) in hist.iter().enumerate() {
                cdf += count;
                lut[value] = ((cdf as f32 / total as f32) * 255.0).round() as u8;
            }
        }
    }

    // Tile coordinate (possibly fractional) of a pixel, and the pair of tile
    // indices plus blend weight to interpolate between.
    let tile_blend = |pos: u32, extent: u32, tiles: u32| -> (u32, u32, f32) {
        let f = (pos as f32 + 0.5) * tiles as f32 / extent as f32 - 0.5;
        if f <= 0.0 {
            (0, 0, 0.0)
        } else if f >= (tiles - 1) as f32 {
            (tiles - 1, tiles - 1, 0.0)
        } else {
            let t = f.floor() as u32;
            (t, t + 1, f - f.floor())
        }
    };

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (ty0, ty1, ay) = tile_blend(y, h, tiles_y);
        for x in 0..w {
            let (tx0, tx1, ax) = tile_blend(x, w, tiles_x);
            let v = gray.get_pixel(x, y)[0] as usize;
            let lut_at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = lut_at(tx0, ty0) * (1.0 - ax) + lut_at(tx1, ty0) * ax;
            let bottom = lut_at(tx0, ty1) * (1.0 - ax) + lut_at(tx1, ty1) * ax;
            let blended = top * (1.0 - ay) + bottom * ay;
            out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

// ── Stage 2: brightness normalisation ────────────────────────────────────

fn normalize_brightness(
    image: &DynamicImage,
    _family: ColorFamily,
) -> Result<DynamicImage, StageError> {
    let gray = image.to_luma8();
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return Err(StageError::new("brightness", "empty image"));
    }

    let mean = pixels.iter().map(|&p| p as u64).sum::<u64>() as f64 / pixels.len() as f64;
    let delta = if mean < 50.0 {
        50
    } else if mean > 200.0 {
        -30
    } else {
        (128.0 - mean).round() as i32
    };

    if delta == 0 {
        // Already at target; hand back the image untouched.
        return Ok(image.clone());
    }
    debug!(mean, delta, "adjusting brightness");
    Ok(image.brighten(delta))
}

// ── Stage 3: rotation correction ─────────────────────────────────────────

fn correct_rotation(image: &DynamicImage, family: ColorFamily) -> Result<DynamicImage, StageError> {
    let gray = image.to_luma8();
    let edges = canny(&gray, 50.0, 150.0);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: 100,
            suppression_radius: 8,
        },
    );

    // First 10 lines only: later lines are low-vote noise.
    let mut angles: Vec<f64> = lines
        .iter()
        .take(10)
        .map(|line| line.angle_in_degrees as f64 - 90.0)
        .filter(|a| (-45.0..=45.0).contains(a))
        .collect();
    if angles.is_empty() {
        return Ok(image.clone());
    }

    angles.sort_by(|a, b| a.total_cmp(b));
    let mid = angles.len() / 2;
    let median = if angles.len() % 2 == 0 {
        (angles[mid - 1] + angles[mid]) / 2.0
    } else {
        angles[mid]
    };
    if median.abs() <= 2.0 {
        return Ok(image.clone());
    }

    debug!(skew = median, "correcting label rotation");
    Ok(rotate_expanded(image, -median, family))
}

/// Rotate by `angle_deg` about the image centre, expanding the canvas so no
/// corner is cropped. New border pixels are white, matching label stock.
fn rotate_expanded(image: &DynamicImage, angle_deg: f64, family: ColorFamily) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    let theta = angle_deg.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    // Bounding box of the rotated rectangle. A thin label rotated far can
    // have a narrower box than the source, so the canvas also has to hold
    // the unrotated paste.
    let new_w = ((h as f64 * sin + w as f64 * cos).ceil() as u32).max(w);
    let new_h = ((h as f64 * cos + w as f64 * sin).ceil() as u32).max(h);
    let offset_x = ((new_w - w) / 2) as i64;
    let offset_y = ((new_h - h) / 2) as i64;
    let center = (new_w as f32 / 2.0, new_h as f32 / 2.0);

    match family {
        ColorFamily::Luma => {
            let mut canvas = GrayImage::from_pixel(new_w, new_h, Luma([255]));
            image::imageops::overlay(&mut canvas, &image.to_luma8(), offset_x, offset_y);
            DynamicImage::ImageLuma8(rotate(
                &canvas,
                center,
                theta as f32,
                Interpolation::Bilinear,
                Luma([255]),
            ))
        }
        ColorFamily::Color => {
            let mut canvas = RgbImage::from_pixel(new_w, new_h, Rgb([255, 255, 255]));
            image::imageops::overlay(&mut canvas, &image.to_rgb8(), offset_x, offset_y);
            DynamicImage::ImageRgb8(rotate(
                &canvas,
                center,
                theta as f32,
                Interpolation::Bilinear,
                Rgb([255, 255, 255]),
            ))
        }
    }
}

// ── Stage 4: edge-preserving denoise ─────────────────────────────────────

fn reduce_noise(image: &DynamicImage, family: ColorFamily) -> Result<DynamicImage, StageError> {
    match family {
        ColorFamily::Luma => Ok(DynamicImage::ImageLuma8(bilateral_filter(
            &image.to_luma8(),
            9,
            75.0,
            75.0,
        ))),
        ColorFamily::Color => {
            let rgb = image.to_rgb8();
            let (w, h) = rgb.dimensions();
            let filtered: Vec<GrayImage> = (0..3)
                .map(|c| {
                    let channel = GrayImage::from_fn(w, h, |x, y| Luma([rgb.get_pixel(x, y)[c]]));
                    bilateral_filter(&channel, 9, 75.0, 75.0)
                })
                .collect();
            let out = RgbImage::from_fn(w, h, |x, y| {
                Rgb([
                    filtered[0].get_pixel(x, y)[0],
                    filtered[1].get_pixel(x, y)[0],
                    filtered[2].get_pixel(x, y)[0],
                ])
            });
            Ok(DynamicImage::ImageRgb8(out))
        }
    }
}

// ── Stage 5: sharpening ──────────────────────────────────────────────────

fn sharpen(image: &DynamicImage, family: ColorFamily) -> Result<DynamicImage, StageError> {
    match family {
        ColorFamily::Luma => Ok(DynamicImage::ImageLuma8(filter3x3::<Luma<u8>, f32, u8>(
            &image.to_luma8(),
            &SHARPEN_KERNEL,
        ))),
        ColorFamily::Color => Ok(DynamicImage::ImageRgb8(filter3x3::<Rgb<u8>, f32, u8>(
            &image.to_rgb8(),
            &SHARPEN_KERNEL,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_uniform(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([v])))
    }

    fn rgb_uniform(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    #[test]
    fn grayscale_input_stays_grayscale() {
        let out = condition_blocking(gray_uniform(64, 48, 120));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn color_input_stays_color() {
        let out = condition_blocking(rgb_uniform(64, 48, 120));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn flat_image_keeps_dimensions() {
        // No detectable lines, so rotation is a no-op and dims survive.
        let out = condition_blocking(rgb_uniform(80, 60, 128));
        assert_eq!((out.width(), out.height()), (80, 60));
    }

    #[test]
    fn tiny_image_does_not_panic() {
        let out = condition_blocking(gray_uniform(1, 1, 0));
        assert_eq!((out.width(), out.height()), (1, 1));
    }

    #[test]
    fn brightness_dark_image_gets_fixed_boost() {
        let out = normalize_brightness(&gray_uniform(16, 16, 30), ColorFamily::Luma).unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 80);
    }

    #[test]
    fn brightness_bright_image_gets_fixed_cut() {
        let out = normalize_brightness(&gray_uniform(16, 16, 220), ColorFamily::Luma).unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 190);
    }

    #[test]
    fn brightness_mid_image_nudged_to_target() {
        let out = normalize_brightness(&gray_uniform(16, 16, 100), ColorFamily::Luma).unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0)[0], 128);
    }

    #[test]
    fn brightness_at_target_is_untouched() {
        let input = gray_uniform(16, 16, 128);
        let out = normalize_brightness(&input, ColorFamily::Luma).unwrap();
        assert_eq!(out.to_luma8().as_raw(), input.to_luma8().as_raw());
    }

    #[test]
    fn clahe_preserves_dimensions() {
        let gray = GrayImage::from_fn(100, 70, |x, y| Luma([((x + y) % 256) as u8]));
        let out = clahe(&gray, 2.0, 8, 8);
        assert_eq!(out.dimensions(), (100, 70));
    }

    #[test]
    fn clahe_spreads_low_contrast_histogram() {
        // Values packed into 100..=115 should cover a wider range afterwards.
        let gray = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x * y) % 16) as u8]));
        let out = clahe(&gray, 2.0, 8, 8);
        let (min, max) = out
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(max - min > 15, "expected spread, got {min}..{max}");
    }

    #[test]
    fn rotate_expanded_grows_canvas_to_fit() {
        let img = rgb_uniform(40, 20, 50);
        let out = rotate_expanded(&img, 30.0, ColorFamily::Color);
        // 30° bounding box of 40×20 is 45×38.
        assert_eq!((out.width(), out.height()), (45, 38));
    }

    #[test]
    fn rotate_expanded_thin_label_keeps_source_extent() {
        // The 44° bounding box of 100×10 is narrower than the source; the
        // canvas must still hold the unrotated paste.
        let img = gray_uniform(100, 10, 0);
        let out = rotate_expanded(&img, 44.0, ColorFamily::Luma);
        assert!(out.width() >= 100, "width {}", out.width());
        assert!(out.height() >= 10, "height {}", out.height());
    }

    #[test]
    fn rotate_expanded_fills_border_white() {
        let img = gray_uniform(40, 20, 0);
        let out = rotate_expanded(&img, 30.0, ColorFamily::Luma).to_luma8();
        // Expanded corners lie outside the source rectangle.
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn small_skew_is_left_alone() {
        // Uniform image yields no Hough lines at all.
        let img = gray_uniform(120, 80, 200);
        let out = correct_rotation(&img, ColorFamily::Luma).unwrap();
        assert_eq!((out.width(), out.height()), (120, 80));
    }
}
