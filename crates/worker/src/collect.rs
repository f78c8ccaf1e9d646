//! Street collection phase: pull road links for the area, enrich them,
//! and derive the analysis points the pipeline will work through.
//!
//! Everything here is an upsert (keyed on TOID where one exists), so
//! re-running collection refreshes names without duplicating rows.

use kerb_db::models::street::{CreateStreet, CreateStreetPoint};
use kerb_db::repositories::street_point_repo::StreetPointRepo;
use kerb_db::repositories::street_repo::StreetRepo;
use kerb_sources::street_data::{sample_line, StreetDataSource};
use sqlx::PgPool;
use tracing::info;

use crate::config::WorkerConfig;

pub async fn collect_streets(
    pool: &PgPool,
    source: &dyn StreetDataSource,
    cfg: &WorkerConfig,
) -> anyhow::Result<usize> {
    let records = source.fetch_streets(&cfg.area).await?;
    info!(streets = records.len(), "collected road links");

    let mut point_count = 0usize;
    for record in &records {
        let street = StreetRepo::upsert(
            pool,
            &CreateStreet {
                toid: record.toid.clone(),
                name: record.name.clone(),
                postcode_district: record.postcode_district.clone(),
                local_authority: record.local_authority.clone(),
                region: record.region.clone(),
            },
        )
        .await?;

        for (index, &(latitude, longitude)) in sample_line(&record.line, cfg.point_sample_interval_m)
            .iter()
            .enumerate()
        {
            // Point TOIDs are derived from the link TOID so re-collection
            // hits the same rows.
            let toid = record.toid.as_ref().map(|t| format!("{t}:{index}"));
            StreetPointRepo::upsert(
                pool,
                &CreateStreetPoint {
                    street_id: Some(street.id),
                    toid,
                    latitude,
                    longitude,
                },
            )
            .await?;
            point_count += 1;
        }
    }

    info!(points = point_count, "street collection complete");
    Ok(point_count)
}
