//! Analysis worker: connects to the database, optionally runs street
//! collection, then drives the photo pipeline over the configured area
//! with one task per longitude strip.

mod collect;
mod config;

use std::sync::Arc;

use kerb_core::quality::QualityConfig;
use kerb_core::road::ModelInfo;
use kerb_db::batch::BatchCounts;
use kerb_pipeline::{AnalysisPipeline, PgPipelineStore, PipelineConfig};
use kerb_sources::images::{ImageSource, MapillaryClient};
use kerb_sources::rate_limit::RateLimiter;
use kerb_sources::scorer::{HttpScorer, Scorer};
use kerb_sources::street_data::OsFeaturesClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = WorkerConfig::from_env()?;
    info!(
        area = %cfg.area.to_csv(),
        concurrency = cfg.concurrency,
        run_collection = cfg.run_collection,
        "starting analysis worker"
    );

    let pipeline_cfg = PipelineConfig {
        quality: QualityConfig::from_env(),
        ..PipelineConfig::default()
    };
    pipeline_cfg.quality.validate()?;
    pipeline_cfg.road.validate()?;

    let pool = kerb_db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    kerb_db::run_migrations(&pool).await?;
    kerb_db::health_check(&pool).await?;
    info!("database ready");

    if cfg.run_collection {
        let limiter = Arc::new(RateLimiter::per_minute(60));
        let streets = OsFeaturesClient::new(&cfg.os_features_base_url, &cfg.os_api_key, limiter);
        let points = collect::collect_streets(&pool, &streets, &cfg).await?;
        info!(points, "collection phase done");
    }

    // One limiter per upstream key, shared across every task.
    let mapillary_limiter = Arc::new(RateLimiter::per_minute(cfg.mapillary_rate_limit_per_minute));
    let images: Arc<dyn ImageSource> = Arc::new(MapillaryClient::new(
        cfg.mapillary_access_token.clone(),
        mapillary_limiter,
    ));
    let scorer: Arc<dyn Scorer> = Arc::new(HttpScorer::new(
        cfg.scorer_endpoint.clone(),
        ModelInfo {
            name: cfg.scorer_model_name.clone(),
            version: cfg.scorer_model_version.clone(),
        },
        Arc::new(RateLimiter::per_minute(cfg.scorer_rate_limit_per_minute)),
    ));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received; finishing in-flight photos");
                cancel.cancel();
            }
        });
    }

    let store = Arc::new(PgPipelineStore::new(pool.clone()));
    let pipeline = AnalysisPipeline::new(store, images, scorer, pipeline_cfg, cancel.clone());

    let availability = pipeline.check_data_availability(&cfg.area).await?;
    if !availability.ready {
        warn!("no street points in the configured area; nothing to analyze");
        return Ok(());
    }
    info!(points = availability.points_in_area, "area availability confirmed");

    let mut handles = Vec::new();
    for (strip_index, strip) in cfg.area.split_lon(cfg.concurrency).into_iter().enumerate() {
        let pipe = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let report = pipe.run_area_analysis(&strip).await;
            info!(
                strip = strip_index,
                points = report.points.len(),
                processed = report.counts.processed,
                skipped_duplicate = report.counts.skipped_duplicate,
                failed = report.counts.failed,
                "strip finished"
            );
            report
        }));
    }

    let mut totals = BatchCounts::default();
    let mut cancelled = false;
    let mut aborted = 0usize;
    for handle in handles {
        let report = handle.await?;
        totals.processed += report.counts.processed;
        totals.skipped_duplicate += report.counts.skipped_duplicate;
        totals.failed += report.counts.failed;
        cancelled |= report.cancelled;
        if let Some(err) = report.error {
            aborted += 1;
            error!(error = %err, "strip aborted");
        }
    }

    // Strips rebuild groups as they finish; do it once more so the final
    // set reflects every strip's photos.
    let groups = pipeline.rebuild_groups().await?;

    let stats = pipeline.get_database_statistics().await?;
    info!(
        processed = totals.processed,
        skipped_duplicate = totals.skipped_duplicate,
        failed = totals.failed,
        groups,
        cancelled,
        total_photos = stats.total_photos,
        usable_photos = stats.usable_photos,
        road_analyzed = stats.road_analyzed,
        "worker run complete"
    );

    if aborted > 0 {
        anyhow::bail!("{aborted} strip(s) aborted on system errors");
    }
    Ok(())
}
