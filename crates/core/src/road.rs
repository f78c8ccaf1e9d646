//! Road-condition result contract: the raw scorer output shape, rating
//! bands, and the mapping into persisted metrics.
//!
//! The mapping is deterministic: two calls with the same raw output and
//! model version produce identical metrics. Timestamps are applied by
//! the database at persistence time, never here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Rating constants
// ---------------------------------------------------------------------------

pub const RATING_EXCELLENT: &str = "excellent";
pub const RATING_GOOD: &str = "good";
pub const RATING_FAIR: &str = "fair";
pub const RATING_POOR: &str = "poor";
pub const RATING_SEVERE_ISSUES: &str = "severe_issues";

/// Ratings from best to worst (matches the `road_quality_rating` enum).
pub const VALID_RATINGS: &[&str] = &[
    RATING_EXCELLENT,
    RATING_GOOD,
    RATING_FAIR,
    RATING_POOR,
    RATING_SEVERE_ISSUES,
];

pub const CRACK_SEVERITY_NONE: &str = "none";
pub const CRACK_SEVERITY_MINOR: &str = "minor";
pub const CRACK_SEVERITY_MODERATE: &str = "moderate";
pub const CRACK_SEVERITY_SEVERE: &str = "severe";

/// Severities from least to most severe (matches `crack_severity`).
pub const VALID_CRACK_SEVERITIES: &[&str] = &[
    CRACK_SEVERITY_NONE,
    CRACK_SEVERITY_MINOR,
    CRACK_SEVERITY_MODERATE,
    CRACK_SEVERITY_SEVERE,
];

pub const SURFACE_ASPHALT: &str = "asphalt";
pub const SURFACE_CONCRETE: &str = "concrete";
pub const SURFACE_GRAVEL: &str = "gravel";
pub const SURFACE_COBBLESTONE: &str = "cobblestone";
pub const SURFACE_UNKNOWN: &str = "unknown";

/// Surface labels accepted by storage (matches `road_surface_type`).
pub const VALID_SURFACE_TYPES: &[&str] = &[
    SURFACE_ASPHALT,
    SURFACE_CONCRETE,
    SURFACE_GRAVEL,
    SURFACE_COBBLESTONE,
    SURFACE_UNKNOWN,
];

/// Normalize a free-text surface label from the scorer.
///
/// Scorers report whatever their training vocabulary contains; a label
/// outside the stored vocabulary becomes `unknown` instead of failing
/// the write later.
pub fn normalize_surface_type(raw: Option<&str>) -> Option<String> {
    let label = raw?.trim().to_ascii_lowercase();
    if label.is_empty() {
        return None;
    }
    if VALID_SURFACE_TYPES.contains(&label.as_str()) {
        Some(label)
    } else {
        Some(SURFACE_UNKNOWN.to_string())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Score bands mapping the overall quality score to an ordinal rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadConfig {
    pub excellent_min: f64,
    pub good_min: f64,
    pub fair_min: f64,
    pub poor_min: f64,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            excellent_min: 90.0,
            good_min: 75.0,
            fair_min: 50.0,
            poor_min: 25.0,
        }
    }
}

impl RoadConfig {
    /// Bands must be strictly descending and within `[0, 100]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let bands = [
            self.excellent_min,
            self.good_min,
            self.fair_min,
            self.poor_min,
        ];
        if bands.iter().any(|b| !(0.0..=100.0).contains(b)) {
            return Err(CoreError::Validation(
                "Rating bands must be between 0 and 100".to_string(),
            ));
        }
        if bands.windows(2).any(|w| w[0] <= w[1]) {
            return Err(CoreError::Validation(
                "Rating bands must be strictly descending".to_string(),
            ));
        }
        Ok(())
    }
}

/// Map an overall quality score to its ordinal rating.
pub fn rating_for_score(score: f64, cfg: &RoadConfig) -> &'static str {
    if score >= cfg.excellent_min {
        RATING_EXCELLENT
    } else if score >= cfg.good_min {
        RATING_GOOD
    } else if score >= cfg.fair_min {
        RATING_FAIR
    } else if score >= cfg.poor_min {
        RATING_POOR
    } else {
        RATING_SEVERE_ISSUES
    }
}

/// Map a crack-detection confidence to a severity label.
pub fn crack_severity_for_confidence(confidence: f64) -> &'static str {
    if confidence < 0.2 {
        CRACK_SEVERITY_NONE
    } else if confidence < 0.5 {
        CRACK_SEVERITY_MINOR
    } else if confidence < 0.8 {
        CRACK_SEVERITY_MODERATE
    } else {
        CRACK_SEVERITY_SEVERE
    }
}

// ---------------------------------------------------------------------------
// Scorer contract
// ---------------------------------------------------------------------------

/// Raw output of the road-condition scorer for one image.
///
/// All confidences are in `[0, 1]`; anything out of range is clamped
/// during the metrics mapping rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScorerOutput {
    pub crack_confidence: f64,
    pub pothole_confidence: f64,
    #[serde(default)]
    pub pothole_count: i32,
    pub surface_roughness: f64,
    #[serde(default = "default_lane_visibility")]
    pub lane_marking_visibility: f64,
    #[serde(default)]
    pub debris_score: f64,
    #[serde(default = "default_weather")]
    pub weather_condition: String,
    #[serde(default)]
    pub surface_type: Option<String>,
    #[serde(default = "default_confidence")]
    pub assessment_confidence: f64,
}

fn default_lane_visibility() -> f64 {
    0.5
}

fn default_weather() -> String {
    "unknown".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Name and version of the model that produced a scorer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// The persisted road-condition assessment for one usable photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadMetrics {
    pub overall_quality_score: f64,
    pub quality_rating: String,
    pub crack_confidence: f64,
    pub crack_severity: String,
    pub pothole_confidence: f64,
    pub pothole_count: i32,
    pub surface_roughness: f64,
    pub surface_type: Option<String>,
    pub lane_marking_visibility: f64,
    pub debris_score: f64,
    pub weather_condition: String,
    pub assessment_confidence: f64,
    pub model_name: String,
    pub model_version: String,
}

impl RoadMetrics {
    /// Build metrics from raw scorer output.
    ///
    /// The overall score is `100 * (1 - worst_defect)` where the worst
    /// defect is the highest of crack, pothole, and roughness signals.
    pub fn from_scorer_output(raw: &RawScorerOutput, model: &ModelInfo, cfg: &RoadConfig) -> Self {
        let crack = raw.crack_confidence.clamp(0.0, 1.0);
        let pothole = raw.pothole_confidence.clamp(0.0, 1.0);
        let roughness = raw.surface_roughness.clamp(0.0, 1.0);

        let worst_defect = crack.max(pothole).max(roughness);
        let overall = (100.0 * (1.0 - worst_defect)).clamp(0.0, 100.0);

        Self {
            overall_quality_score: overall,
            quality_rating: rating_for_score(overall, cfg).to_string(),
            crack_confidence: crack,
            crack_severity: crack_severity_for_confidence(crack).to_string(),
            pothole_confidence: pothole,
            pothole_count: raw.pothole_count.max(0),
            surface_roughness: roughness,
            surface_type: normalize_surface_type(raw.surface_type.as_deref()),
            lane_marking_visibility: raw.lane_marking_visibility.clamp(0.0, 1.0),
            debris_score: raw.debris_score.clamp(0.0, 1.0),
            weather_condition: raw.weather_condition.clone(),
            assessment_confidence: raw.assessment_confidence.clamp(0.0, 1.0),
            model_name: model.name.clone(),
            model_version: model.version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(crack: f64, pothole: f64, roughness: f64) -> RawScorerOutput {
        RawScorerOutput {
            crack_confidence: crack,
            pothole_confidence: pothole,
            pothole_count: 0,
            surface_roughness: roughness,
            lane_marking_visibility: 0.5,
            debris_score: 0.0,
            weather_condition: "dry".to_string(),
            surface_type: Some("asphalt".to_string()),
            assessment_confidence: 0.9,
        }
    }

    fn model() -> ModelInfo {
        ModelInfo {
            name: "road-yolo".to_string(),
            version: "2.1.0".to_string(),
        }
    }

    #[test]
    fn default_bands_valid() {
        RoadConfig::default().validate().unwrap();
    }

    #[test]
    fn ascending_bands_rejected() {
        let cfg = RoadConfig {
            excellent_min: 50.0,
            good_min: 75.0,
            ..RoadConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rating_bands() {
        let cfg = RoadConfig::default();
        assert_eq!(rating_for_score(95.0, &cfg), RATING_EXCELLENT);
        assert_eq!(rating_for_score(90.0, &cfg), RATING_EXCELLENT);
        assert_eq!(rating_for_score(80.0, &cfg), RATING_GOOD);
        assert_eq!(rating_for_score(50.0, &cfg), RATING_FAIR);
        assert_eq!(rating_for_score(30.0, &cfg), RATING_POOR);
        assert_eq!(rating_for_score(10.0, &cfg), RATING_SEVERE_ISSUES);
    }

    #[test]
    fn crack_severity_bands() {
        assert_eq!(crack_severity_for_confidence(0.1), CRACK_SEVERITY_NONE);
        assert_eq!(crack_severity_for_confidence(0.3), CRACK_SEVERITY_MINOR);
        assert_eq!(crack_severity_for_confidence(0.6), CRACK_SEVERITY_MODERATE);
        assert_eq!(crack_severity_for_confidence(0.9), CRACK_SEVERITY_SEVERE);
    }

    #[test]
    fn overall_score_tracks_worst_defect() {
        let m = RoadMetrics::from_scorer_output(&raw(0.3, 0.1, 0.05), &model(), &RoadConfig::default());
        assert!((m.overall_quality_score - 70.0).abs() < 1e-9);
        assert_eq!(m.quality_rating, RATING_FAIR);
        assert_eq!(m.crack_severity, CRACK_SEVERITY_MINOR);
    }

    #[test]
    fn out_of_range_confidences_clamped() {
        let m = RoadMetrics::from_scorer_output(&raw(1.5, -0.2, 0.0), &model(), &RoadConfig::default());
        assert_eq!(m.crack_confidence, 1.0);
        assert_eq!(m.pothole_confidence, 0.0);
        assert_eq!(m.overall_quality_score, 0.0);
        assert_eq!(m.quality_rating, RATING_SEVERE_ISSUES);
    }

    #[test]
    fn negative_pothole_count_clamped() {
        let mut r = raw(0.0, 0.0, 0.0);
        r.pothole_count = -3;
        let m = RoadMetrics::from_scorer_output(&r, &model(), &RoadConfig::default());
        assert_eq!(m.pothole_count, 0);
    }

    #[test]
    fn surface_type_normalized_to_stored_vocabulary() {
        let cfg = RoadConfig::default();
        let mut r = raw(0.0, 0.0, 0.0);

        r.surface_type = Some(" Concrete ".to_string());
        let m = RoadMetrics::from_scorer_output(&r, &model(), &cfg);
        assert_eq!(m.surface_type.as_deref(), Some(SURFACE_CONCRETE));

        r.surface_type = Some("dirt".to_string());
        let m = RoadMetrics::from_scorer_output(&r, &model(), &cfg);
        assert_eq!(m.surface_type.as_deref(), Some(SURFACE_UNKNOWN));

        r.surface_type = Some("  ".to_string());
        let m = RoadMetrics::from_scorer_output(&r, &model(), &cfg);
        assert_eq!(m.surface_type, None);

        r.surface_type = None;
        let m = RoadMetrics::from_scorer_output(&r, &model(), &cfg);
        assert_eq!(m.surface_type, None);
    }

    #[test]
    fn mapping_is_deterministic() {
        let r = raw(0.42, 0.17, 0.33);
        let a = RoadMetrics::from_scorer_output(&r, &model(), &RoadConfig::default());
        let b = RoadMetrics::from_scorer_output(&r, &model(), &RoadConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn model_stamp_carried_through() {
        let m = RoadMetrics::from_scorer_output(&raw(0.0, 0.0, 0.0), &model(), &RoadConfig::default());
        assert_eq!(m.model_name, "road-yolo");
        assert_eq!(m.model_version, "2.1.0");
    }

    #[test]
    fn scorer_output_deserializes_with_defaults() {
        let raw: RawScorerOutput = serde_json::from_str(
            r#"{"crack_confidence": 0.2, "pothole_confidence": 0.1, "surface_roughness": 0.3}"#,
        )
        .unwrap();
        assert_eq!(raw.pothole_count, 0);
        assert_eq!(raw.weather_condition, "unknown");
        assert_eq!(raw.lane_marking_visibility, 0.5);
    }
}
