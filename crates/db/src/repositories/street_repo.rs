//! Repository for the `streets` table.

use kerb_core::types::DbId;
use sqlx::PgPool;

use crate::models::street::{CreateStreet, Street};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, toid, name, postcode_district, local_authority, region, created_at";

pub struct StreetRepo;

impl StreetRepo {
    /// Insert a street, or refresh the name fields when the TOID already
    /// exists. Streets without a TOID dedupe on name and postcode
    /// district so re-collection refreshes them instead of growing the
    /// table.
    pub async fn upsert(pool: &PgPool, input: &CreateStreet) -> Result<Street, sqlx::Error> {
        if input.toid.is_some() {
            let query = format!(
                "INSERT INTO streets (toid, name, postcode_district, local_authority, region)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT ON CONSTRAINT uq_streets_toid
                 DO UPDATE SET name = EXCLUDED.name,
                               postcode_district = EXCLUDED.postcode_district,
                               local_authority = EXCLUDED.local_authority,
                               region = EXCLUDED.region
                 RETURNING {COLUMNS}"
            );
            return sqlx::query_as::<_, Street>(&query)
                .bind(&input.toid)
                .bind(&input.name)
                .bind(&input.postcode_district)
                .bind(&input.local_authority)
                .bind(&input.region)
                .fetch_one(pool)
                .await;
        }

        // The unique constraint admits multiple NULL TOIDs, so the
        // lookup happens here. Collection runs single-task.
        let refresh = format!(
            "UPDATE streets
             SET local_authority = $3, region = $4
             WHERE toid IS NULL
               AND name IS NOT DISTINCT FROM $1
               AND postcode_district IS NOT DISTINCT FROM $2
             RETURNING {COLUMNS}"
        );
        let existing = sqlx::query_as::<_, Street>(&refresh)
            .bind(&input.name)
            .bind(&input.postcode_district)
            .bind(&input.local_authority)
            .bind(&input.region)
            .fetch_optional(pool)
            .await?;
        if let Some(street) = existing {
            return Ok(street);
        }

        let insert = format!(
            "INSERT INTO streets (name, postcode_district, local_authority, region)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Street>(&insert)
            .bind(&input.name)
            .bind(&input.postcode_district)
            .bind(&input.local_authority)
            .bind(&input.region)
            .fetch_one(pool)
            .await
    }

    /// Fetch a street by id.
    pub async fn get(pool: &PgPool, id: DbId) -> Result<Option<Street>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM streets WHERE id = $1");
        sqlx::query_as::<_, Street>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
