//! Group-analysis models: spatial clusters of usable photos.

use kerb_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `road_analysis_groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoadAnalysisGroup {
    pub id: DbId,
    pub latitude: f64,
    pub longitude: f64,
    pub tolerance_m: f64,
    pub photo_count: i32,
    pub avg_quality_score: f64,
    pub avg_road_score: f64,
    pub avg_crack_confidence: f64,
    pub avg_pothole_confidence: f64,
    pub avg_surface_roughness: f64,
    pub total_pothole_count: i32,
    pub dominant_quality_rating: String,
    pub dominant_crack_severity: String,
    pub dominant_surface_type: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for creating a group together with its member links.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub latitude: f64,
    pub longitude: f64,
    pub tolerance_m: f64,
    pub avg_quality_score: f64,
    pub avg_road_score: f64,
    pub avg_crack_confidence: f64,
    pub avg_pothole_confidence: f64,
    pub avg_surface_roughness: f64,
    pub total_pothole_count: i32,
    pub dominant_quality_rating: String,
    pub dominant_crack_severity: String,
    pub dominant_surface_type: Option<String>,
    /// `(photo_id, quality_result_id)` pairs; only quality-passed photos
    /// may appear here.
    pub members: Vec<(DbId, DbId)>,
}

/// A joined row used as input to the aggregation pass: one usable photo
/// with its quality and analysis results.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsablePhotoAnalysis {
    pub photo_id: DbId,
    pub quality_result_id: DbId,
    pub latitude: f64,
    pub longitude: f64,
    pub quality_score: f64,
    pub road_score: f64,
    pub crack_confidence: f64,
    pub pothole_confidence: f64,
    pub surface_roughness: f64,
    pub pothole_count: i32,
    pub quality_rating: String,
    pub crack_severity: String,
    pub surface_type: Option<String>,
}
