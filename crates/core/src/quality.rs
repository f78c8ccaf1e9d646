//! Quality-gate decision logic.
//!
//! Screens a photo before the expensive road-condition scorer runs.
//! The gate is a pure function of image bytes and configuration: three
//! bounded sub-scores (blur, exposure, size), a road-coverage estimate,
//! a weighted overall score, and a usability verdict with explicit
//! failure reasons.
//!
//! Invariant, checked by construction here and again at persistence
//! time: `failure_reasons` is empty if and only if `is_usable` is true.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::heuristics::{self, HeuristicReport};

/// Version stamp written to every quality result row.
pub const ASSESSMENT_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Failure reasons
// ---------------------------------------------------------------------------

/// Why a photo failed the quality gate.
///
/// Stored as text in `quality_results.failure_reasons`; `as_str` values
/// are stable identifiers, `display_message` is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TooBlurry,
    TooDark,
    TooBright,
    ResolutionTooSmall,
    InsufficientRoadSurface,
    LowOverallScore,
    ProcessingError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TooBlurry => "too_blurry",
            FailureReason::TooDark => "too_dark",
            FailureReason::TooBright => "too_bright",
            FailureReason::ResolutionTooSmall => "resolution_too_small",
            FailureReason::InsufficientRoadSurface => "insufficient_road_surface",
            FailureReason::LowOverallScore => "low_overall_score",
            FailureReason::ProcessingError => "processing_error",
        }
    }

    pub fn display_message(&self) -> &'static str {
        match self {
            FailureReason::TooBlurry => "Image is too blurry for analysis",
            FailureReason::TooDark => "Image is underexposed",
            FailureReason::TooBright => "Image is overexposed",
            FailureReason::ResolutionTooSmall => "Image resolution is below the minimum",
            FailureReason::InsufficientRoadSurface => "Not enough road surface visible",
            FailureReason::LowOverallScore => "Overall quality score below minimum",
            FailureReason::ProcessingError => "Image could not be processed",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds and weights for the quality gate.
///
/// Defaults match the collection-phase calibration; every value can be
/// overridden from the environment via [`QualityConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct QualityConfig {
    /// Laplacian variance below which an image counts as blurry.
    pub blur_variance_threshold: f64,
    pub min_width: u32,
    pub min_height: u32,
    /// Fraction of dark pixels above which exposure is poor.
    pub dark_threshold: f64,
    /// Fraction of bright pixels above which exposure is poor.
    pub bright_threshold: f64,
    /// Minimum road coverage percentage for `has_sufficient_road`.
    pub min_road_surface_percentage: f64,

    // Overall-score weights (must sum to 1.0).
    pub blur_weight: f64,
    pub exposure_weight: f64,
    pub size_weight: f64,

    // Road-coverage adjustment to the overall score.
    pub max_road_bonus: f64,
    pub insufficient_road_penalty: f64,

    /// Minimum overall score for usability.
    pub min_overall_score: f64,
    // Per-sub-score floors; any sub-score below its floor fails the gate.
    pub blur_floor: f64,
    pub exposure_floor: f64,
    pub size_floor: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_variance_threshold: 50.0,
            min_width: 400,
            min_height: 300,
            dark_threshold: 0.2,
            bright_threshold: 0.8,
            min_road_surface_percentage: 25.0,
            blur_weight: 0.4,
            exposure_weight: 0.3,
            size_weight: 0.3,
            max_road_bonus: 20.0,
            insufficient_road_penalty: -30.0,
            min_overall_score: 40.0,
            blur_floor: 30.0,
            exposure_floor: 30.0,
            size_floor: 30.0,
        }
    }
}

impl QualityConfig {
    /// Build a config from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            blur_variance_threshold: env_f64("QUALITY_BLUR_THRESHOLD", d.blur_variance_threshold),
            min_width: env_u32("QUALITY_MIN_WIDTH", d.min_width),
            min_height: env_u32("QUALITY_MIN_HEIGHT", d.min_height),
            dark_threshold: env_f64("QUALITY_DARK_THRESHOLD", d.dark_threshold),
            bright_threshold: env_f64("QUALITY_BRIGHT_THRESHOLD", d.bright_threshold),
            min_road_surface_percentage: env_f64(
                "QUALITY_MIN_ROAD_SURFACE",
                d.min_road_surface_percentage,
            ),
            min_overall_score: env_f64("QUALITY_MIN_OVERALL_SCORE", d.min_overall_score),
            ..d
        }
    }

    /// Validate threshold and weight ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.blur_variance_threshold <= 0.0 {
            return Err(CoreError::Validation(
                "Blur variance threshold must be positive".to_string(),
            ));
        }
        if self.min_width == 0 || self.min_height == 0 {
            return Err(CoreError::Validation(
                "Minimum image dimensions must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dark_threshold)
            || !(0.0..1.0).contains(&self.bright_threshold)
        {
            return Err(CoreError::Validation(
                "Exposure thresholds must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_road_surface_percentage) {
            return Err(CoreError::Validation(
                "Minimum road surface percentage must be between 0 and 100".to_string(),
            ));
        }
        let weight_sum = self.blur_weight + self.exposure_weight + self.size_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::Validation(format!(
                "Sub-score weights must sum to 1.0, got {weight_sum}"
            )));
        }
        for (name, floor) in [
            ("blur", self.blur_floor),
            ("exposure", self.exposure_floor),
            ("size", self.size_floor),
        ] {
            if !(0.0..=100.0).contains(&floor) {
                return Err(CoreError::Validation(format!(
                    "{name} floor must be between 0 and 100, got {floor}"
                )));
            }
        }
        Ok(())
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// The full quality-gate verdict for one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub overall_score: f64,
    pub blur_score: f64,
    pub exposure_score: f64,
    pub size_score: f64,
    pub road_surface_percentage: f64,
    pub has_sufficient_road: bool,
    pub is_usable: bool,
    pub failure_reasons: Vec<FailureReason>,
    pub assessment_version: String,
}

impl QualityMetrics {
    /// Verdict for an image that could not be decoded or measured.
    pub fn processing_failed() -> Self {
        Self {
            overall_score: 0.0,
            blur_score: 0.0,
            exposure_score: 0.0,
            size_score: 0.0,
            road_surface_percentage: 0.0,
            has_sufficient_road: false,
            is_usable: false,
            failure_reasons: vec![FailureReason::ProcessingError],
            assessment_version: ASSESSMENT_VERSION.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Run the full quality gate on raw image bytes.
///
/// Never returns an error: an undecodable image yields a
/// `processing_error` verdict so the photo can still be persisted with
/// its (failed) quality result.
pub fn evaluate_image(bytes: &[u8], cfg: &QualityConfig) -> QualityMetrics {
    let report = match heuristics::inspect_image(bytes) {
        Ok(r) => r,
        Err(_) => return QualityMetrics::processing_failed(),
    };

    let mut reasons = heuristic_failure_reasons(&report, cfg);
    let blur_score = blur_score(&report, cfg);
    let exposure_score = exposure_score(&report, cfg);
    let size_score = size_score(&report, cfg);

    // Sub-score floors; dedup against reasons the checks above produced.
    for (score, floor, reason) in [
        (blur_score, cfg.blur_floor, FailureReason::TooBlurry),
        (exposure_score, cfg.exposure_floor, FailureReason::TooDark),
        (size_score, cfg.size_floor, FailureReason::ResolutionTooSmall),
    ] {
        if score < floor && !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }

    if !reasons.is_empty() {
        // Heuristics failed: skip the road-coverage estimate entirely.
        return QualityMetrics {
            overall_score: blur_score.min(exposure_score).min(size_score),
            blur_score,
            exposure_score,
            size_score,
            road_surface_percentage: 0.0,
            has_sufficient_road: false,
            is_usable: false,
            failure_reasons: reasons,
            assessment_version: ASSESSMENT_VERSION.to_string(),
        };
    }

    let road_surface_percentage = match heuristics::estimate_road_surface(bytes) {
        Ok(p) => p,
        Err(_) => return QualityMetrics::processing_failed(),
    };
    let has_sufficient_road = road_surface_percentage >= cfg.min_road_surface_percentage;

    let overall_score = overall_score(
        blur_score,
        exposure_score,
        size_score,
        road_surface_percentage,
        cfg,
    );

    if !has_sufficient_road {
        reasons.push(FailureReason::InsufficientRoadSurface);
    }
    if overall_score < cfg.min_overall_score {
        reasons.push(FailureReason::LowOverallScore);
    }

    let is_usable = reasons.is_empty();
    QualityMetrics {
        overall_score,
        blur_score,
        exposure_score,
        size_score,
        road_surface_percentage,
        has_sufficient_road,
        is_usable,
        failure_reasons: reasons,
        assessment_version: ASSESSMENT_VERSION.to_string(),
    }
}

/// Blur sub-score in `[0, 100]`: sharp images score 100, blurry images
/// score their Laplacian variance (so "barely blurry" sits near the
/// threshold and "very blurry" near 0).
fn blur_score(report: &HeuristicReport, cfg: &QualityConfig) -> f64 {
    if report.blur_variance >= cfg.blur_variance_threshold {
        100.0
    } else {
        report.blur_variance.clamp(0.0, 100.0)
    }
}

/// Exposure sub-score in `[0, 100]`, penalizing the worse of the dark
/// and bright fractions when exposure is poor.
fn exposure_score(report: &HeuristicReport, cfg: &QualityConfig) -> f64 {
    let poor = report.dark_fraction > cfg.dark_threshold
        || report.bright_fraction > cfg.bright_threshold;
    if poor {
        let penalty = report.dark_fraction.max(report.bright_fraction) * 100.0;
        (100.0 - penalty).max(0.0)
    } else {
        100.0
    }
}

/// Size sub-score in `[0, 100]`, proportional to pixel count when the
/// image is below the minimum dimensions.
fn size_score(report: &HeuristicReport, cfg: &QualityConfig) -> f64 {
    if report.width >= cfg.min_width && report.height >= cfg.min_height {
        100.0
    } else {
        let min_pixels = (cfg.min_width as f64) * (cfg.min_height as f64);
        let actual = (report.width as f64) * (report.height as f64);
        (actual / min_pixels * 100.0).min(100.0)
    }
}

/// Weighted overall score with a road-coverage bonus or penalty.
fn overall_score(
    blur: f64,
    exposure: f64,
    size: f64,
    road_percentage: f64,
    cfg: &QualityConfig,
) -> f64 {
    let weighted = blur * cfg.blur_weight + exposure * cfg.exposure_weight + size * cfg.size_weight;
    let road_adjustment = if road_percentage >= cfg.min_road_surface_percentage {
        (road_percentage / 5.0).min(cfg.max_road_bonus)
    } else {
        cfg.insufficient_road_penalty
    };
    (weighted + road_adjustment).clamp(0.0, 100.0)
}

fn heuristic_failure_reasons(report: &HeuristicReport, cfg: &QualityConfig) -> Vec<FailureReason> {
    let mut reasons = Vec::new();
    if report.blur_variance < cfg.blur_variance_threshold {
        reasons.push(FailureReason::TooBlurry);
    }
    if report.dark_fraction > cfg.dark_threshold {
        reasons.push(FailureReason::TooDark);
    }
    if report.bright_fraction > cfg.bright_threshold {
        reasons.push(FailureReason::TooBright);
    }
    if report.width < cfg.min_width || report.height < cfg.min_height {
        reasons.push(FailureReason::ResolutionTooSmall);
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(
        blur_variance: f64,
        dark: f64,
        bright: f64,
        width: u32,
        height: u32,
    ) -> HeuristicReport {
        HeuristicReport {
            blur_variance,
            dark_fraction: dark,
            bright_fraction: bright,
            width,
            height,
        }
    }

    #[test]
    fn default_config_is_valid() {
        QualityConfig::default().validate().unwrap();
    }

    #[test]
    fn bad_weights_rejected() {
        let cfg = QualityConfig {
            blur_weight: 0.5,
            exposure_weight: 0.5,
            size_weight: 0.5,
            ..QualityConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sharp_image_scores_full_blur() {
        let cfg = QualityConfig::default();
        assert_eq!(blur_score(&report(500.0, 0.0, 0.0, 800, 600), &cfg), 100.0);
    }

    #[test]
    fn blurry_image_scores_its_variance() {
        let cfg = QualityConfig::default();
        assert_eq!(blur_score(&report(10.0, 0.0, 0.0, 800, 600), &cfg), 10.0);
    }

    #[test]
    fn dark_image_penalized() {
        let cfg = QualityConfig::default();
        let score = exposure_score(&report(500.0, 0.6, 0.0, 800, 600), &cfg);
        assert!((score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn small_image_scores_by_pixel_ratio() {
        let cfg = QualityConfig::default();
        // 200x150 is a quarter of the 400x300 minimum.
        let score = size_score(&report(500.0, 0.0, 0.0, 200, 150), &cfg);
        assert!((score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn heuristic_failure_skips_road_estimate() {
        // Bytes are never decoded on this path, so use a synthetic report
        // through the private helpers.
        let cfg = QualityConfig::default();
        let reasons = heuristic_failure_reasons(&report(10.0, 0.0, 0.0, 800, 600), &cfg);
        assert_eq!(reasons, vec![FailureReason::TooBlurry]);
    }

    #[test]
    fn processing_failed_is_unusable_with_reason() {
        let m = QualityMetrics::processing_failed();
        assert!(!m.is_usable);
        assert_eq!(m.failure_reasons, vec![FailureReason::ProcessingError]);
    }

    #[test]
    fn undecodable_bytes_yield_processing_error() {
        let m = evaluate_image(b"garbage", &QualityConfig::default());
        assert!(!m.is_usable);
        assert_eq!(m.failure_reasons, vec![FailureReason::ProcessingError]);
    }

    #[test]
    fn failure_reasons_empty_iff_usable() {
        // A real decodable image: flat mid-gray passes blur? No — flat
        // images have zero variance, so it fails as blurry. Both branches
        // still uphold the invariant.
        let img = image::GrayImage::from_pixel(800, 600, image::Luma([100]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let m = evaluate_image(&bytes.into_inner(), &QualityConfig::default());
        assert_eq!(m.is_usable, m.failure_reasons.is_empty());
    }

    #[test]
    fn overall_score_applies_road_penalty() {
        let cfg = QualityConfig::default();
        let with_road = overall_score(100.0, 100.0, 100.0, 60.0, &cfg);
        let without_road = overall_score(100.0, 100.0, 100.0, 5.0, &cfg);
        assert!(with_road > without_road);
        assert!(without_road <= 70.0);
    }

    #[test]
    fn overall_score_clamped_to_100() {
        let cfg = QualityConfig::default();
        assert!(overall_score(100.0, 100.0, 100.0, 100.0, &cfg) <= 100.0);
    }
}
