//! Road-analysis model: one row per usable photo.

use kerb_core::road::RoadMetrics;
use kerb_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `road_analysis_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoadAnalysisResult {
    pub id: DbId,
    pub photo_id: DbId,
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
    pub created_at: Timestamp,
}

/// DTO for creating a road analysis result.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoadAnalysis {
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

impl From<&RoadMetrics> for CreateRoadAnalysis {
    fn from(m: &RoadMetrics) -> Self {
        Self {
            overall_quality_score: m.overall_quality_score,
            quality_rating: m.quality_rating.clone(),
            crack_confidence: m.crack_confidence,
            crack_severity: m.crack_severity.clone(),
            pothole_confidence: m.pothole_confidence,
            pothole_count: m.pothole_count,
            surface_roughness: m.surface_roughness,
            surface_type: m.surface_type.clone(),
            lane_marking_visibility: m.lane_marking_visibility,
            debris_score: m.debris_score,
            weather_condition: m.weather_condition.clone(),
            assessment_confidence: m.assessment_confidence,
            model_name: m.model_name.clone(),
            model_version: m.model_version.clone(),
        }
    }
}
