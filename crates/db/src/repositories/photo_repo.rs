//! Repository for the `photos` table.
//!
//! Duplicate detection is the unique constraint on
//! `(source, source_image_id)`, checked at insert time. A prior SELECT
//! is never authoritative under concurrent writers, so `reserve_or_get`
//! inserts with `ON CONFLICT DO NOTHING` and falls back to the lookup
//! only after the insert reported a conflict.

use kerb_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::photo::{CreatePhoto, Photo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, street_point_id, source::text AS source, source_image_id, \
    ST_Y(location) AS latitude, ST_X(location) AS longitude, captured_at, \
    compass_angle, created_at";

/// Provides insert and lookup operations for photos.
pub struct PhotoRepo;

impl PhotoRepo {
    /// Insert the photo, or return the existing row's id on a dedup hit.
    ///
    /// Returns `(photo_id, created)` where `created` is false when a row
    /// for this `(source, source_image_id)` already existed. Race-safe:
    /// two concurrent callers get the same id, exactly one sees
    /// `created = true`. Takes a connection so the batch writer can run
    /// it inside its transaction.
    pub async fn reserve_or_get(
        conn: &mut PgConnection,
        input: &CreatePhoto,
    ) -> Result<(DbId, bool), sqlx::Error> {
        let inserted: Option<(DbId,)> = sqlx::query_as(
            "INSERT INTO photos
                (street_point_id, source, source_image_id, location, captured_at, compass_angle)
             VALUES
                ($1, $2::image_source, $3,
                 ST_SetSRID(ST_MakePoint($4, $5), 4326), $6, $7)
             ON CONFLICT (source, source_image_id) DO NOTHING
             RETURNING id",
        )
        .bind(input.street_point_id)
        .bind(&input.source)
        .bind(&input.source_image_id)
        .bind(input.longitude)
        .bind(input.latitude)
        .bind(input.captured_at)
        .bind(input.compass_angle)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some((id,)) = inserted {
            return Ok((id, true));
        }

        // Conflict: the row exists (photos are never deleted by the pipeline).
        let (id,): (DbId,) = sqlx::query_as(
            "SELECT id FROM photos WHERE source = $1::image_source AND source_image_id = $2",
        )
        .bind(&input.source)
        .bind(&input.source_image_id)
        .fetch_one(conn)
        .await?;
        Ok((id, false))
    }

    /// Fetch a photo by id.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE id = $1");
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a photo by its dedup key.
    pub async fn find_by_dedup_key(
        pool: &PgPool,
        source: &str,
        source_image_id: &str,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos
             WHERE source = $1::image_source AND source_image_id = $2"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(source)
            .bind(source_image_id)
            .fetch_optional(pool)
            .await
    }

    /// List photos attached to a street point.
    pub async fn list_by_street_point(
        pool: &PgPool,
        street_point_id: DbId,
    ) -> Result<Vec<Photo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos
             WHERE street_point_id = $1
             ORDER BY created_at"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(street_point_id)
            .fetch_all(pool)
            .await
    }
}
