//! Read-only aggregate statistics over the whole database.

use sqlx::PgPool;

use crate::models::stats::{DatabaseStatistics, RegionCoverage};

pub struct StatsRepo;

impl StatsRepo {
    /// Gather the summary counters, averages, and per-region coverage.
    pub async fn gather(pool: &PgPool) -> Result<DatabaseStatistics, sqlx::Error> {
        let (total_points, total_photos, quality_assessed, usable_photos, road_analyzed): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM street_points),
                    (SELECT COUNT(*) FROM photos),
                    (SELECT COUNT(*) FROM quality_results),
                    (SELECT COUNT(*) FROM quality_results WHERE is_usable),
                    (SELECT COUNT(*) FROM road_analysis_results)",
        )
        .fetch_one(pool)
        .await?;

        let (avg_quality_score, avg_road_score): (Option<f64>, Option<f64>) = sqlx::query_as(
            "SELECT (SELECT AVG(overall_score) FROM quality_results WHERE is_usable),
                    (SELECT AVG(overall_quality_score) FROM road_analysis_results)",
        )
        .fetch_one(pool)
        .await?;

        let coverage_by_region = sqlx::query_as::<_, RegionCoverage>(
            "SELECT COALESCE(s.region, 'unknown') AS region,
                    COUNT(DISTINCT sp.id) AS point_count,
                    COUNT(p.id) AS photo_count
             FROM street_points sp
             LEFT JOIN streets s ON s.id = sp.street_id
             LEFT JOIN photos p ON p.street_point_id = sp.id
             GROUP BY COALESCE(s.region, 'unknown')
             ORDER BY region",
        )
        .fetch_all(pool)
        .await?;

        let usable_photo_ratio = if quality_assessed > 0 {
            usable_photos as f64 / quality_assessed as f64
        } else {
            0.0
        };

        Ok(DatabaseStatistics {
            total_points,
            total_photos,
            quality_assessed,
            usable_photos,
            road_analyzed,
            usable_photo_ratio,
            avg_quality_score,
            avg_road_score,
            coverage_by_region,
        })
    }
}
