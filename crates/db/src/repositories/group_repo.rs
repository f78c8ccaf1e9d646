//! Repository for the `road_analysis_groups` and `group_analysis_photos`
//! tables.
//!
//! Groups are derived data. Re-running aggregation replaces the whole
//! set in one transaction so readers never observe a half-built mix of
//! old and new clusters.

use kerb_core::types::DbId;
use sqlx::PgPool;
use tracing::info;

use crate::models::group::{CreateGroup, RoadAnalysisGroup, UsablePhotoAnalysis};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, ST_Y(center) AS latitude, ST_X(center) AS longitude, \
    tolerance_m, photo_count, avg_quality_score, avg_road_score, \
    avg_crack_confidence, avg_pothole_confidence, avg_surface_roughness, \
    total_pothole_count, dominant_quality_rating::text AS dominant_quality_rating, \
    dominant_crack_severity::text AS dominant_crack_severity, \
    dominant_surface_type::text AS dominant_surface_type, created_at";

pub struct GroupRepo;

impl GroupRepo {
    /// Load every usable photo together with its quality and analysis
    /// rows, as input to the clustering pass. Photos without a location
    /// cannot be clustered and are excluded.
    pub async fn list_usable_photo_analyses(
        pool: &PgPool,
    ) -> Result<Vec<UsablePhotoAnalysis>, sqlx::Error> {
        sqlx::query_as::<_, UsablePhotoAnalysis>(
            "SELECT p.id AS photo_id,
                    q.id AS quality_result_id,
                    ST_Y(p.location) AS latitude,
                    ST_X(p.location) AS longitude,
                    q.overall_score AS quality_score,
                    r.overall_quality_score AS road_score,
                    r.crack_confidence,
                    r.pothole_confidence,
                    r.surface_roughness,
                    r.pothole_count,
                    r.quality_rating::text AS quality_rating,
                    r.crack_severity::text AS crack_severity,
                    r.surface_type::text AS surface_type
             FROM photos p
             JOIN quality_results q ON q.photo_id = p.id AND q.is_usable
             JOIN road_analysis_results r ON r.photo_id = p.id
             WHERE p.location IS NOT NULL
             ORDER BY p.id",
        )
        .fetch_all(pool)
        .await
    }

    /// Drop all existing groups and write the new set atomically.
    /// Returns the number of groups written.
    pub async fn replace_groups(
        pool: &PgPool,
        groups: &[CreateGroup],
    ) -> Result<usize, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Link rows go with them via ON DELETE CASCADE.
        sqlx::query("DELETE FROM road_analysis_groups")
            .execute(&mut *tx)
            .await?;

        for group in groups {
            let (group_id,): (DbId,) = sqlx::query_as(
                "INSERT INTO road_analysis_groups
                    (center, tolerance_m, photo_count, avg_quality_score, avg_road_score,
                     avg_crack_confidence, avg_pothole_confidence, avg_surface_roughness,
                     total_pothole_count, dominant_quality_rating, dominant_crack_severity,
                     dominant_surface_type)
                 VALUES (ST_SetSRID(ST_MakePoint($1, $2), 4326), $3, $4, $5, $6, $7, $8,
                         $9, $10, $11::road_quality_rating, $12::crack_severity,
                         $13::road_surface_type)
                 RETURNING id",
            )
            .bind(group.longitude)
            .bind(group.latitude)
            .bind(group.tolerance_m)
            .bind(group.members.len() as i32)
            .bind(group.avg_quality_score)
            .bind(group.avg_road_score)
            .bind(group.avg_crack_confidence)
            .bind(group.avg_pothole_confidence)
            .bind(group.avg_surface_roughness)
            .bind(group.total_pothole_count)
            .bind(&group.dominant_quality_rating)
            .bind(&group.dominant_crack_severity)
            .bind(&group.dominant_surface_type)
            .fetch_one(&mut *tx)
            .await?;

            for &(photo_id, quality_result_id) in &group.members {
                sqlx::query(
                    "INSERT INTO group_analysis_photos (group_id, photo_id, quality_result_id)
                     VALUES ($1, $2, $3)",
                )
                .bind(group_id)
                .bind(photo_id)
                .bind(quality_result_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(group_count = groups.len(), "replaced analysis groups");
        Ok(groups.len())
    }

    /// List all groups.
    pub async fn list(pool: &PgPool) -> Result<Vec<RoadAnalysisGroup>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM road_analysis_groups ORDER BY id");
        sqlx::query_as::<_, RoadAnalysisGroup>(&query)
            .fetch_all(pool)
            .await
    }

    /// Count groups.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM road_analysis_groups")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
