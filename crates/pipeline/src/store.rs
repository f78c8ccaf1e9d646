//! Persistence seam for the orchestrator.
//!
//! The pipeline talks to storage through this trait so the scenario
//! tests can run against an in-memory double; production uses
//! [`PgPipelineStore`] over the repository layer.

use async_trait::async_trait;
use kerb_core::geo::BoundingBox;
use kerb_core::types::DbId;
use kerb_db::batch::{BatchError, BatchWriter, PersistOutcome, PhotoTriple};
use kerb_db::models::group::{CreateGroup, UsablePhotoAnalysis};
use kerb_db::models::stats::DatabaseStatistics;
use kerb_db::models::street::StreetPoint;
use kerb_db::repositories::group_repo::GroupRepo;
use kerb_db::repositories::stats_repo::StatsRepo;
use kerb_db::repositories::street_point_repo::StreetPointRepo;
use sqlx::PgPool;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn count_points_in_bbox(&self, bbox: &BoundingBox) -> Result<i64, BatchError>;

    async fn list_unprocessed_points(&self, limit: i64) -> Result<Vec<StreetPoint>, BatchError>;

    async fn list_unprocessed_points_in_bbox(
        &self,
        bbox: &BoundingBox,
        limit: i64,
    ) -> Result<Vec<StreetPoint>, BatchError>;

    async fn mark_point_processed(&self, point_id: DbId) -> Result<(), BatchError>;

    /// Commit one photo's rows atomically. See [`BatchWriter`].
    async fn commit_photo_result(&self, triple: &PhotoTriple)
        -> Result<PersistOutcome, BatchError>;

    async fn list_usable_photo_analyses(&self) -> Result<Vec<UsablePhotoAnalysis>, BatchError>;

    async fn replace_groups(&self, groups: &[CreateGroup]) -> Result<usize, BatchError>;

    async fn statistics(&self) -> Result<DatabaseStatistics, BatchError>;
}

/// Production store backed by PostgreSQL.
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn count_points_in_bbox(&self, bbox: &BoundingBox) -> Result<i64, BatchError> {
        Ok(StreetPointRepo::count_in_bbox(&self.pool, bbox).await?)
    }

    async fn list_unprocessed_points(&self, limit: i64) -> Result<Vec<StreetPoint>, BatchError> {
        Ok(StreetPointRepo::list_unprocessed(&self.pool, limit).await?)
    }

    async fn list_unprocessed_points_in_bbox(
        &self,
        bbox: &BoundingBox,
        limit: i64,
    ) -> Result<Vec<StreetPoint>, BatchError> {
        Ok(StreetPointRepo::list_unprocessed_in_bbox(&self.pool, bbox, limit).await?)
    }

    async fn mark_point_processed(&self, point_id: DbId) -> Result<(), BatchError> {
        Ok(StreetPointRepo::mark_processed(&self.pool, point_id).await?)
    }

    async fn commit_photo_result(
        &self,
        triple: &PhotoTriple,
    ) -> Result<PersistOutcome, BatchError> {
        BatchWriter::commit_photo_result(&self.pool, triple).await
    }

    async fn list_usable_photo_analyses(&self) -> Result<Vec<UsablePhotoAnalysis>, BatchError> {
        Ok(GroupRepo::list_usable_photo_analyses(&self.pool).await?)
    }

    async fn replace_groups(&self, groups: &[CreateGroup]) -> Result<usize, BatchError> {
        Ok(GroupRepo::replace_groups(&self.pool, groups).await?)
    }

    async fn statistics(&self) -> Result<DatabaseStatistics, BatchError> {
        Ok(StatsRepo::gather(&self.pool).await?)
    }
}
