//! Quality-result model: exactly one row per photo.

use kerb_core::quality::QualityMetrics;
use kerb_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quality_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QualityResult {
    pub id: DbId,
    pub photo_id: DbId,
    pub overall_score: f64,
    pub blur_score: f64,
    pub exposure_score: f64,
    pub size_score: f64,
    pub road_surface_percentage: f64,
    pub has_sufficient_road: bool,
    pub is_usable: bool,
    pub failure_reasons: Vec<String>,
    pub assessment_version: String,
    pub created_at: Timestamp,
}

/// DTO for creating a quality result.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQualityResult {
    pub overall_score: f64,
    pub blur_score: f64,
    pub exposure_score: f64,
    pub size_score: f64,
    pub road_surface_percentage: f64,
    pub has_sufficient_road: bool,
    pub is_usable: bool,
    pub failure_reasons: Vec<String>,
    pub assessment_version: String,
}

impl From<&QualityMetrics> for CreateQualityResult {
    fn from(m: &QualityMetrics) -> Self {
        Self {
            overall_score: m.overall_score,
            blur_score: m.blur_score,
            exposure_score: m.exposure_score,
            size_score: m.size_score,
            road_surface_percentage: m.road_surface_percentage,
            has_sufficient_road: m.has_sufficient_road,
            is_usable: m.is_usable,
            failure_reasons: m
                .failure_reasons
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
            assessment_version: m.assessment_version.clone(),
        }
    }
}
