//! Repository for the `street_points` table.

use kerb_core::geo::BoundingBox;
use kerb_core::types::DbId;
use sqlx::PgPool;

use crate::models::street::{CreateStreetPoint, StreetPoint};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, street_id, toid, ST_Y(location) AS latitude, \
    ST_X(location) AS longitude, processed_at, created_at";

/// Provides read and upsert operations for street points.
///
/// Points are created by the collection phase; the pipeline only reads
/// them and stamps `processed_at`.
pub struct StreetPointRepo;

impl StreetPointRepo {
    /// Insert a point, or return the existing row when the TOID is
    /// already present (idempotent re-runs of the collection phase).
    pub async fn upsert(
        pool: &PgPool,
        input: &CreateStreetPoint,
    ) -> Result<StreetPoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO street_points (street_id, toid, location)
             VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326))
             ON CONFLICT (toid) WHERE toid IS NOT NULL
             DO UPDATE SET street_id = COALESCE(street_points.street_id, EXCLUDED.street_id)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StreetPoint>(&query)
            .bind(input.street_id)
            .bind(&input.toid)
            .bind(input.longitude)
            .bind(input.latitude)
            .fetch_one(pool)
            .await
    }

    /// Fetch a single point by id.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<StreetPoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM street_points WHERE id = $1");
        sqlx::query_as::<_, StreetPoint>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List points that have never been processed, oldest first.
    pub async fn list_unprocessed(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<StreetPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM street_points
             WHERE processed_at IS NULL
             ORDER BY id
             LIMIT $1"
        );
        sqlx::query_as::<_, StreetPoint>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// List unprocessed points inside the bounding box, oldest first.
    pub async fn list_unprocessed_in_bbox(
        pool: &PgPool,
        bbox: &BoundingBox,
        limit: i64,
    ) -> Result<Vec<StreetPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM street_points
             WHERE processed_at IS NULL
               AND location && ST_MakeEnvelope($1, $2, $3, $4, 4326)
             ORDER BY id
             LIMIT $5"
        );
        sqlx::query_as::<_, StreetPoint>(&query)
            .bind(bbox.min_lon)
            .bind(bbox.min_lat)
            .bind(bbox.max_lon)
            .bind(bbox.max_lat)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Count points whose location falls inside the bounding box.
    pub async fn count_in_bbox(pool: &PgPool, bbox: &BoundingBox) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM street_points
             WHERE location && ST_MakeEnvelope($1, $2, $3, $4, 4326)",
        )
        .bind(bbox.min_lon)
        .bind(bbox.min_lat)
        .bind(bbox.max_lon)
        .bind(bbox.max_lat)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Stamp a point as processed.
    pub async fn mark_processed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE street_points SET processed_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
