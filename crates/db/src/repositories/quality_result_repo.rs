//! Repository for the `quality_results` table.
//!
//! Inserts go through a caller-owned connection so the batch writer can
//! run them inside the same transaction as the photo row.

use kerb_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::quality::{CreateQualityResult, QualityResult};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, photo_id, overall_score, blur_score, exposure_score, \
    size_score, road_surface_percentage, has_sufficient_road, is_usable, \
    failure_reasons, assessment_version, created_at";

pub struct QualityResultRepo;

impl QualityResultRepo {
    /// Insert a quality result for a photo, returning the new row id.
    pub async fn insert(
        conn: &mut PgConnection,
        photo_id: DbId,
        input: &CreateQualityResult,
    ) -> Result<DbId, sqlx::Error> {
        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO quality_results
                (photo_id, overall_score, blur_score, exposure_score, size_score,
                 road_surface_percentage, has_sufficient_road, is_usable,
                 failure_reasons, assessment_version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
        )
        .bind(photo_id)
        .bind(input.overall_score)
        .bind(input.blur_score)
        .bind(input.exposure_score)
        .bind(input.size_score)
        .bind(input.road_surface_percentage)
        .bind(input.has_sufficient_road)
        .bind(input.is_usable)
        .bind(&input.failure_reasons)
        .bind(&input.assessment_version)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    /// Fetch the quality result for a photo, if any.
    pub async fn get_by_photo(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<QualityResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quality_results WHERE photo_id = $1");
        sqlx::query_as::<_, QualityResult>(&query)
            .bind(photo_id)
            .fetch_optional(pool)
            .await
    }

    /// Count all quality results; set `usable_only` to count passes.
    pub async fn count(pool: &PgPool, usable_only: bool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM quality_results WHERE is_usable OR NOT $1")
                .bind(usable_only)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}
