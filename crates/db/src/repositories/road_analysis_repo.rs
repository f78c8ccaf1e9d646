//! Repository for the `road_analysis_results` table.

use kerb_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::road_analysis::{CreateRoadAnalysis, RoadAnalysisResult};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, photo_id, overall_quality_score, \
    quality_rating::text AS quality_rating, crack_confidence, \
    crack_severity::text AS crack_severity, pothole_confidence, pothole_count, \
    surface_roughness, surface_type::text AS surface_type, \
    lane_marking_visibility, debris_score, weather_condition, \
    assessment_confidence, model_name, model_version, created_at";

pub struct RoadAnalysisRepo;

impl RoadAnalysisRepo {
    /// Insert an analysis result for a photo, returning the new row id.
    ///
    /// Callers must have verified the photo's quality result is usable;
    /// this method does not re-check.
    pub async fn insert(
        conn: &mut PgConnection,
        photo_id: DbId,
        input: &CreateRoadAnalysis,
    ) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO road_analysis_results
                (photo_id, overall_quality_score, quality_rating, crack_confidence,
                 crack_severity, pothole_confidence, pothole_count, surface_roughness,
                 surface_type, lane_marking_visibility, debris_score, weather_condition,
                 assessment_confidence, model_name, model_version)
             VALUES ($1, $2, $3::road_quality_rating, $4, $5::crack_severity, $6, $7,
                     $8, $9::road_surface_type, $10, $11, $12, $13, $14, $15)
             RETURNING id",
        )
        .bind(photo_id)
        .bind(input.overall_quality_score)
        .bind(&input.quality_rating)
        .bind(input.crack_confidence)
        .bind(&input.crack_severity)
        .bind(input.pothole_confidence)
        .bind(input.pothole_count)
        .bind(input.surface_roughness)
        .bind(&input.surface_type)
        .bind(input.lane_marking_visibility)
        .bind(input.debris_score)
        .bind(&input.weather_condition)
        .bind(input.assessment_confidence)
        .bind(&input.model_name)
        .bind(&input.model_version)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Fetch the analysis result for a photo, if any.
    pub async fn get_by_photo(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<RoadAnalysisResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM road_analysis_results WHERE photo_id = $1");
        sqlx::query_as::<_, RoadAnalysisResult>(&query)
            .bind(photo_id)
            .fetch_optional(pool)
            .await
    }

    /// Count analysis rows whose photo is not marked usable. Always zero
    /// when the batch writer's gating holds; exposed for audits.
    pub async fn count_gating_violations(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM road_analysis_results r
             LEFT JOIN quality_results q ON q.photo_id = r.photo_id
             WHERE q.id IS NULL OR NOT q.is_usable",
        )
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
