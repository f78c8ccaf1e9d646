//! Transactional persistence of per-photo results.
//!
//! Each photo's rows (photo, quality result, optional road analysis)
//! commit in a single transaction: either all of them land or none do.
//! A duplicate photo is a normal outcome, not an error, and writes
//! nothing.

use kerb_core::types::DbId;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::photo::CreatePhoto;
use crate::models::quality::CreateQualityResult;
use crate::models::road_analysis::CreateRoadAnalysis;
use crate::repositories::photo_repo::PhotoRepo;
use crate::repositories::quality_result_repo::QualityResultRepo;
use crate::repositories::road_analysis_repo::RoadAnalysisRepo;

#[derive(Debug, Error)]
pub enum BatchError {
    /// A road analysis was supplied for a photo whose quality result is
    /// not usable. Rejected before anything touches the database.
    #[error("road analysis supplied for unusable photo {0}")]
    GatingViolation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything produced for one photo, committed together.
#[derive(Debug, Clone)]
pub struct PhotoTriple {
    pub photo: CreatePhoto,
    pub quality: CreateQualityResult,
    pub analysis: Option<CreateRoadAnalysis>,
}

/// What happened to one triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// All rows committed.
    Created {
        photo_id: DbId,
        quality_id: DbId,
        analysis_id: Option<DbId>,
    },
    /// The photo already existed; nothing was written.
    DuplicateSkipped { photo_id: DbId },
}

/// Tally over a batch of triples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchCounts {
    pub processed: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}

pub struct BatchWriter;

impl BatchWriter {
    /// Commit one photo's rows atomically.
    ///
    /// The dedup insert and the existing-row lookup both happen inside
    /// the transaction, so a conflict observed here is settled by the
    /// time the caller sees `DuplicateSkipped`.
    pub async fn commit_photo_result(
        pool: &PgPool,
        triple: &PhotoTriple,
    ) -> Result<PersistOutcome, BatchError> {
        if triple.analysis.is_some() && !triple.quality.is_usable {
            return Err(BatchError::GatingViolation(format!(
                "{}:{}",
                triple.photo.source, triple.photo.source_image_id
            )));
        }

        let mut tx = pool.begin().await?;

        let (photo_id, created) = PhotoRepo::reserve_or_get(&mut tx, &triple.photo).await?;
        if !created {
            // Already processed by an earlier run or a sibling worker.
            tx.rollback().await?;
            debug!(photo_id, source_image_id = %triple.photo.source_image_id,
                "duplicate photo skipped");
            return Ok(PersistOutcome::DuplicateSkipped { photo_id });
        }

        let quality_id = QualityResultRepo::insert(&mut tx, photo_id, &triple.quality).await?;

        let analysis_id = match &triple.analysis {
            Some(analysis) => Some(RoadAnalysisRepo::insert(&mut tx, photo_id, analysis).await?),
            None => None,
        };

        tx.commit().await?;
        Ok(PersistOutcome::Created {
            photo_id,
            quality_id,
            analysis_id,
        })
    }

    /// Commit a batch of triples, one transaction each, so a failing
    /// photo never rolls back its siblings. Returns the tally and the
    /// per-triple outcomes in input order.
    pub async fn commit_batch(
        pool: &PgPool,
        triples: &[PhotoTriple],
    ) -> (BatchCounts, Vec<Result<PersistOutcome, BatchError>>) {
        let mut counts = BatchCounts::default();
        let mut outcomes = Vec::with_capacity(triples.len());

        for triple in triples {
            let result = Self::commit_photo_result(pool, triple).await;
            match &result {
                Ok(PersistOutcome::Created { .. }) => counts.processed += 1,
                Ok(PersistOutcome::DuplicateSkipped { .. }) => counts.skipped_duplicate += 1,
                Err(err) => {
                    counts.failed += 1;
                    warn!(source_image_id = %triple.photo.source_image_id, error = %err,
                        "failed to persist photo result");
                }
            }
            outcomes.push(result);
        }

        (counts, outcomes)
    }
}
