//! Fast image heuristics backing the quality gate.
//!
//! These are deliberately cheap: a single decode plus a few passes over
//! the luma plane. Only the output contract matters to the rest of the
//! system — the quality gate consumes a [`HeuristicReport`] and a road
//! surface estimate, not the internals of how they were computed.

use image::GenericImageView;

use crate::error::CoreError;

/// Luma value at or below which a pixel counts as "dark".
const DEFAULT_DARK_PIXEL: u8 = 50;
/// Luma value at or above which a pixel counts as "bright".
const DEFAULT_BRIGHT_PIXEL: u8 = 205;

/// Luma band treated as plausible asphalt when estimating road coverage.
const ROAD_LUMA_MIN: u8 = 55;
const ROAD_LUMA_MAX: u8 = 145;

/// Raw per-image measurements consumed by the quality gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicReport {
    /// Variance of the Laplacian response; low values mean blur.
    pub blur_variance: f64,
    /// Fraction of pixels at or below the dark threshold.
    pub dark_fraction: f64,
    /// Fraction of pixels at or above the bright threshold.
    pub bright_fraction: f64,
    pub width: u32,
    pub height: u32,
}

/// Decode an image and compute the heuristic measurements.
pub fn inspect_image(bytes: &[u8]) -> Result<HeuristicReport, CoreError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::ImageDecode(e.to_string()))?;
    let (width, height) = img.dimensions();
    let luma = img.to_luma8();
    let pixels = luma.as_raw();

    let total = pixels.len().max(1) as f64;
    let dark = pixels.iter().filter(|&&p| p <= DEFAULT_DARK_PIXEL).count() as f64;
    let bright = pixels.iter().filter(|&&p| p >= DEFAULT_BRIGHT_PIXEL).count() as f64;

    Ok(HeuristicReport {
        blur_variance: laplacian_variance(pixels, width as usize, height as usize),
        dark_fraction: dark / total,
        bright_fraction: bright / total,
        width,
        height,
    })
}

/// Estimate the percentage of the frame covered by road surface.
///
/// Looks only at the lower half of the frame (where road sits in a
/// street-level photo) and counts pixels in the asphalt luma band.
/// Returns a value in `[0, 100]`.
pub fn estimate_road_surface(bytes: &[u8]) -> Result<f64, CoreError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::ImageDecode(e.to_string()))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return Ok(0.0);
    }

    // usize arithmetic: the product can exceed u32 for very large frames.
    let lower_start = (height as usize / 2) * width as usize;
    let lower = &luma.as_raw()[lower_start..];
    if lower.is_empty() {
        return Ok(0.0);
    }

    let road_like = lower
        .iter()
        .filter(|&&p| (ROAD_LUMA_MIN..=ROAD_LUMA_MAX).contains(&p))
        .count() as f64;

    Ok((road_like / lower.len() as f64 * 100.0).clamp(0.0, 100.0))
}

/// Variance of the 4-neighbour Laplacian over interior pixels.
fn laplacian_variance(pixels: &[u8], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let n = ((width - 2) * (height - 2)) as f64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = pixels[y * width + x] as f64;
            let up = pixels[(y - 1) * width + x] as f64;
            let down = pixels[(y + 1) * width + x] as f64;
            let left = pixels[y * width + x - 1] as f64;
            let right = pixels[y * width + x + 1] as f64;
            let response = up + down + left + right - 4.0 * center;
            sum += response;
            sum_sq += response * response;
        }
    }

    let mean = sum / n;
    (sum_sq / n) - mean * mean
}
