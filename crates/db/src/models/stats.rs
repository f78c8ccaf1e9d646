//! Aggregate statistics models.

use serde::Serialize;
use sqlx::FromRow;

/// Photo coverage for one region.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegionCoverage {
    pub region: String,
    pub point_count: i64,
    pub photo_count: i64,
}

/// Summary statistics over the whole database.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatistics {
    pub total_points: i64,
    pub total_photos: i64,
    pub quality_assessed: i64,
    pub usable_photos: i64,
    pub road_analyzed: i64,
    /// `usable_photos / quality_assessed`, 0.0 when nothing is assessed.
    pub usable_photo_ratio: f64,
    pub avg_quality_score: Option<f64>,
    pub avg_road_score: Option<f64>,
    pub coverage_by_region: Vec<RegionCoverage>,
}
