//! The analysis pipeline: drives points through fetch, quality gate,
//! scoring, and the atomic per-photo commit.
//!
//! Failure handling is tiered. A bad photo loses only that photo; a bad
//! source response loses only that point; a database error aborts the
//! run, since nothing downstream can succeed without storage.

use std::sync::Arc;

use kerb_core::geo::BoundingBox;
use kerb_core::quality::{evaluate_image, QualityConfig};
use kerb_core::road::{RoadConfig, RoadMetrics};
use kerb_db::batch::{BatchCounts, BatchError, PersistOutcome, PhotoTriple};
use kerb_db::models::photo::CreatePhoto;
use kerb_db::models::stats::DatabaseStatistics;
use kerb_db::models::street::StreetPoint;
use kerb_sources::images::{ImageSource, PhotoMetadata};
use kerb_sources::scorer::Scorer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{self, GroupingConfig};
use crate::outcome::{
    AreaAnalysisReport, DataAvailability, ErrorKind, PhotoOutcome, PointOutcome, PointStatus,
};
use crate::store::PipelineStore;

/// Settings for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Search radius around a point when asking the source for photos.
    /// Wider than the grouping tolerance on purpose: fetching casts a
    /// net, grouping describes a spot.
    pub fetch_radius_m: f64,
    /// Candidate photos considered per point.
    pub photos_per_point: usize,
    /// Points pulled from the queue per iteration.
    pub point_batch_size: i64,
    pub grouping: GroupingConfig,
    pub quality: QualityConfig,
    pub road: RoadConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_radius_m: 8.0,
            photos_per_point: 5,
            point_batch_size: 100,
            grouping: GroupingConfig::default(),
            quality: QualityConfig::default(),
            road: RoadConfig::default(),
        }
    }
}

pub struct AnalysisPipeline<S: PipelineStore> {
    store: Arc<S>,
    images: Arc<dyn ImageSource>,
    scorer: Arc<dyn Scorer>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl<S: PipelineStore> Clone for AnalysisPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            images: Arc::clone(&self.images),
            scorer: Arc::clone(&self.scorer),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: PipelineStore> AnalysisPipeline<S> {
    pub fn new(
        store: Arc<S>,
        images: Arc<dyn ImageSource>,
        scorer: Arc<dyn Scorer>,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            images,
            scorer,
            config,
            cancel,
        }
    }

    /// Pre-flight check: is there anything to analyze in this area?
    pub async fn check_data_availability(
        &self,
        bbox: &BoundingBox,
    ) -> Result<DataAvailability, BatchError> {
        let points_in_area = self.store.count_points_in_bbox(bbox).await?;
        Ok(DataAvailability {
            points_in_area,
            ready: points_in_area > 0,
        })
    }

    /// Process every unprocessed point inside the bounding box, then
    /// rebuild the aggregate groups.
    ///
    /// Run volume is governed by the config rather than a per-call cap:
    /// `point_batch_size` bounds each queue pull and `photos_per_point`
    /// bounds the candidates taken per point.
    ///
    /// Cancellation is checked between points: the in-flight photo
    /// commit always completes or rolls back whole, so stopping here
    /// never strands partial rows.
    #[instrument(skip_all)]
    pub async fn run_area_analysis(&self, bbox: &BoundingBox) -> AreaAnalysisReport {
        let mut counts = BatchCounts::default();
        let mut points = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                info!("analysis cancelled; stopping before next point");
                return AreaAnalysisReport {
                    success: false,
                    cancelled: true,
                    counts,
                    points,
                    groups_written: 0,
                    error: None,
                };
            }

            let batch = match self
                .store
                .list_unprocessed_points_in_bbox(bbox, self.config.point_batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(err) => return AreaAnalysisReport::aborted(points, counts, err.to_string()),
            };
            if batch.is_empty() {
                break;
            }

            for point in batch {
                if self.cancel.is_cancelled() {
                    info!("analysis cancelled; stopping before next point");
                    return AreaAnalysisReport {
                        success: false,
                        cancelled: true,
                        counts,
                        points,
                        groups_written: 0,
                        error: None,
                    };
                }
                match self.process_point(&point).await {
                    Ok(outcome) => {
                        tally(&mut counts, &outcome);
                        let fatal = outcome.photos.iter().find_map(|photo| match photo {
                            PhotoOutcome::Failed {
                                kind: ErrorKind::SystemError,
                                detail,
                            } => Some(detail.clone()),
                            _ => None,
                        });
                        points.push(outcome);
                        // The point stays unprocessed, so a retry after the
                        // operator fixes credentials picks it up again.
                        if let Some(detail) = fatal {
                            warn!(point_id = point.id, error = %detail,
                                "aborting run on permanent upstream rejection");
                            return AreaAnalysisReport::aborted(points, counts, detail);
                        }
                    }
                    Err(err) => {
                        warn!(point_id = point.id, error = %err, "aborting run on storage error");
                        return AreaAnalysisReport::aborted(points, counts, err.to_string());
                    }
                }
                if let Err(err) = self.store.mark_point_processed(point.id).await {
                    return AreaAnalysisReport::aborted(points, counts, err.to_string());
                }
            }
        }

        let groups_written = match self.rebuild_groups().await {
            Ok(n) => n,
            Err(err) => return AreaAnalysisReport::aborted(points, counts, err.to_string()),
        };

        info!(
            points = points.len(),
            processed = counts.processed,
            skipped_duplicate = counts.skipped_duplicate,
            failed = counts.failed,
            groups_written,
            "area analysis complete"
        );
        AreaAnalysisReport {
            success: true,
            cancelled: false,
            counts,
            points,
            groups_written,
            error: None,
        }
    }

    /// Fetch and process all candidate photos for one point.
    ///
    /// `Err` here means storage failed; source-side failures are folded
    /// into the outcome so the run can continue.
    pub async fn process_point(&self, point: &StreetPoint) -> Result<PointOutcome, BatchError> {
        let candidates = match self
            .images
            .photos_near(
                point.latitude,
                point.longitude,
                self.config.fetch_radius_m,
                self.config.photos_per_point,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                let kind = ErrorKind::from(&err);
                warn!(point_id = point.id, error = %err,
                    recommendation = kind.recommendation(), "photo search failed");
                return Ok(PointOutcome {
                    point_id: point.id,
                    status: PointStatus::Failed,
                    photos: vec![PhotoOutcome::Failed {
                        kind,
                        detail: err.to_string(),
                    }],
                });
            }
        };

        if candidates.is_empty() {
            debug!(point_id = point.id, "no imagery near point");
            return Ok(PointOutcome {
                point_id: point.id,
                status: PointStatus::NoPhotos,
                photos: Vec::new(),
            });
        }

        let mut photos = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter().take(self.config.photos_per_point) {
            photos.push(self.process_photo(point, candidate).await?);
        }

        Ok(PointOutcome {
            point_id: point.id,
            status: PointStatus::Completed,
            photos,
        })
    }

    /// Run one candidate through download, quality gate, scoring, and
    /// the atomic commit.
    async fn process_photo(
        &self,
        point: &StreetPoint,
        candidate: &PhotoMetadata,
    ) -> Result<PhotoOutcome, BatchError> {
        let bytes = match self.images.download(candidate).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let kind = ErrorKind::from(&err);
                warn!(image = %candidate.source_image_id, error = %err, "download failed");
                return Ok(PhotoOutcome::Failed {
                    kind,
                    detail: err.to_string(),
                });
            }
        };

        // Never errors: undecodable bytes become a processing_error verdict
        // that is still persisted.
        let quality = evaluate_image(&bytes, &self.config.quality);

        let analysis = if quality.is_usable {
            match self.scorer.score(&bytes).await {
                Ok(raw) => Some(RoadMetrics::from_scorer_output(
                    &raw,
                    &self.scorer.model_info(),
                    &self.config.road,
                )),
                Err(err) => {
                    // Nothing persisted: the photo stays eligible for a
                    // retry once the scorer recovers.
                    let kind = ErrorKind::from(&err);
                    warn!(image = %candidate.source_image_id, error = %err,
                        recommendation = kind.recommendation(), "scoring failed");
                    return Ok(PhotoOutcome::Failed {
                        kind,
                        detail: err.to_string(),
                    });
                }
            }
        } else {
            debug!(image = %candidate.source_image_id,
                reasons = ?quality.failure_reasons, "photo rejected by quality gate");
            None
        };

        let triple = PhotoTriple {
            photo: CreatePhoto {
                street_point_id: Some(point.id),
                source: candidate.source.clone(),
                source_image_id: candidate.source_image_id.clone(),
                latitude: candidate.latitude,
                longitude: candidate.longitude,
                captured_at: candidate.captured_at,
                compass_angle: candidate.compass_angle,
            },
            analysis: analysis.as_ref().map(Into::into),
            quality: (&quality).into(),
        };

        match self.store.commit_photo_result(&triple).await? {
            PersistOutcome::Created {
                photo_id,
                analysis_id,
                ..
            } => Ok(PhotoOutcome::Committed {
                photo_id,
                usable: quality.is_usable,
                analyzed: analysis_id.is_some(),
            }),
            PersistOutcome::DuplicateSkipped { photo_id } => {
                debug!(photo_id, image = %candidate.source_image_id, "duplicate skipped");
                Ok(PhotoOutcome::Duplicate { photo_id })
            }
        }
    }

    /// Re-derive all aggregate groups from the current usable photos.
    pub async fn rebuild_groups(&self) -> Result<usize, BatchError> {
        let photos = self.store.list_usable_photo_analyses().await?;
        let groups = aggregate::build_groups(&photos, &self.config.grouping);
        self.store.replace_groups(&groups).await
    }

    pub async fn get_database_statistics(&self) -> Result<DatabaseStatistics, BatchError> {
        self.store.statistics().await
    }
}

fn tally(counts: &mut BatchCounts, outcome: &PointOutcome) {
    for photo in &outcome.photos {
        match photo {
            PhotoOutcome::Committed { .. } => counts.processed += 1,
            PhotoOutcome::Duplicate { .. } => counts.skipped_duplicate += 1,
            PhotoOutcome::Failed { .. } => counts.failed += 1,
        }
    }
}
