//! Integration tests for the batch writer and repositories.
//!
//! These need a PostgreSQL server with PostGIS; run them with a
//! provisioned DATABASE_URL via `cargo test -- --ignored`.

use kerb_db::batch::{BatchError, BatchWriter, PersistOutcome, PhotoTriple};
use kerb_db::models::group::CreateGroup;
use kerb_db::models::photo::CreatePhoto;
use kerb_db::models::quality::CreateQualityResult;
use kerb_db::models::road_analysis::CreateRoadAnalysis;
use kerb_db::models::street::{CreateStreet, CreateStreetPoint};
use kerb_db::repositories::group_repo::GroupRepo;
use kerb_db::repositories::photo_repo::PhotoRepo;
use kerb_db::repositories::quality_result_repo::QualityResultRepo;
use kerb_db::repositories::road_analysis_repo::RoadAnalysisRepo;
use kerb_db::repositories::stats_repo::StatsRepo;
use kerb_db::repositories::street_point_repo::StreetPointRepo;
use kerb_db::repositories::street_repo::StreetRepo;
use sqlx::PgPool;

fn sample_photo(source_image_id: &str, street_point_id: Option<i64>) -> CreatePhoto {
    CreatePhoto {
        street_point_id,
        source: "mapillary".to_string(),
        source_image_id: source_image_id.to_string(),
        latitude: Some(51.501),
        longitude: Some(-0.142),
        captured_at: None,
        compass_angle: Some(90.0),
    }
}

fn usable_quality() -> CreateQualityResult {
    CreateQualityResult {
        overall_score: 82.0,
        blur_score: 100.0,
        exposure_score: 90.0,
        size_score: 100.0,
        road_surface_percentage: 44.0,
        has_sufficient_road: true,
        is_usable: true,
        failure_reasons: vec![],
        assessment_version: "1.0.0".to_string(),
    }
}

fn rejected_quality() -> CreateQualityResult {
    CreateQualityResult {
        overall_score: 12.0,
        blur_score: 10.0,
        exposure_score: 40.0,
        size_score: 100.0,
        road_surface_percentage: 0.0,
        has_sufficient_road: false,
        is_usable: false,
        failure_reasons: vec!["too_blurry".to_string()],
        assessment_version: "1.0.0".to_string(),
    }
}

fn sample_analysis() -> CreateRoadAnalysis {
    CreateRoadAnalysis {
        overall_quality_score: 70.0,
        quality_rating: "fair".to_string(),
        crack_confidence: 0.3,
        crack_severity: "minor".to_string(),
        pothole_confidence: 0.1,
        pothole_count: 0,
        surface_roughness: 0.2,
        surface_type: Some("asphalt".to_string()),
        lane_marking_visibility: 0.8,
        debris_score: 0.05,
        weather_condition: "clear".to_string(),
        assessment_confidence: 0.9,
        model_name: "road-scorer".to_string(),
        model_version: "2.1".to_string(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn commits_full_triple_atomically(pool: PgPool) {
    let point = StreetPointRepo::upsert(
        &pool,
        &CreateStreetPoint {
            street_id: None,
            toid: Some("osgb1000001".to_string()),
            latitude: 51.501,
            longitude: -0.142,
        },
    )
    .await
    .unwrap();

    let triple = PhotoTriple {
        photo: sample_photo("img-1", Some(point.id)),
        quality: usable_quality(),
        analysis: Some(sample_analysis()),
    };
    let outcome = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap();

    let PersistOutcome::Created {
        photo_id,
        analysis_id,
        ..
    } = outcome
    else {
        panic!("expected Created, got {outcome:?}");
    };
    assert!(analysis_id.is_some());

    let quality = QualityResultRepo::get_by_photo(&pool, photo_id)
        .await
        .unwrap()
        .unwrap();
    assert!(quality.is_usable);
    let analysis = RoadAnalysisRepo::get_by_photo(&pool, photo_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(analysis.quality_rating, "fair");
    assert_eq!(analysis.surface_type.as_deref(), Some("asphalt"));

    let photo = PhotoRepo::find_by_dedup_key(&pool, "mapillary", "img-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(photo.id, photo_id);
    assert_eq!(photo.street_point_id, Some(point.id));
    assert!((photo.latitude.unwrap() - 51.501).abs() < 1e-9);

    let at_point = PhotoRepo::list_by_street_point(&pool, point.id).await.unwrap();
    assert_eq!(at_point.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn duplicate_photo_writes_nothing(pool: PgPool) {
    let triple = PhotoTriple {
        photo: sample_photo("img-dup", None),
        quality: usable_quality(),
        analysis: Some(sample_analysis()),
    };
    let first = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap();
    let PersistOutcome::Created { photo_id, .. } = first else {
        panic!("expected Created");
    };

    let second = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap();
    assert_eq!(second, PersistOutcome::DuplicateSkipped { photo_id });

    // Still exactly one quality row and one analysis row.
    let (quality_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quality_results")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (analysis_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM road_analysis_results")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(quality_rows, 1);
    assert_eq!(analysis_rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn gating_violation_rejected_before_any_write(pool: PgPool) {
    let triple = PhotoTriple {
        photo: sample_photo("img-gated", None),
        quality: rejected_quality(),
        analysis: Some(sample_analysis()),
    };
    let err = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::GatingViolation(_)));

    let (photo_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(photo_rows, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn rejected_photo_commits_without_analysis(pool: PgPool) {
    let triple = PhotoTriple {
        photo: sample_photo("img-rejected", None),
        quality: rejected_quality(),
        analysis: None,
    };
    let outcome = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap();
    let PersistOutcome::Created {
        photo_id,
        analysis_id,
        ..
    } = outcome
    else {
        panic!("expected Created");
    };
    assert_eq!(analysis_id, None);

    let quality = QualityResultRepo::get_by_photo(&pool, photo_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!quality.is_usable);
    assert_eq!(quality.failure_reasons, vec!["too_blurry".to_string()]);
    assert_eq!(RoadAnalysisRepo::count_gating_violations(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn constraint_failure_mid_triple_leaves_no_photo_row(pool: PgPool) {
    // An inconsistent verdict trips the check constraint on
    // quality_results, after the photo insert already ran inside the
    // same transaction.
    let mut quality = usable_quality();
    quality.failure_reasons = vec!["too_blurry".to_string()];
    let triple = PhotoTriple {
        photo: sample_photo("img-torn", None),
        quality,
        analysis: None,
    };

    let err = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::Database(_)));

    let photo = PhotoRepo::find_by_dedup_key(&pool, "mapillary", "img-torn")
        .await
        .unwrap();
    assert!(photo.is_none());
    let (photo_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(photo_rows, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_committers_settle_on_one_row(pool: PgPool) {
    let triple = PhotoTriple {
        photo: sample_photo("img-race", None),
        quality: usable_quality(),
        analysis: Some(sample_analysis()),
    };

    let (a, b) = tokio::join!(
        BatchWriter::commit_photo_result(&pool, &triple),
        BatchWriter::commit_photo_result(&pool, &triple),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    fn photo_id_of(outcome: &PersistOutcome) -> i64 {
        match outcome {
            PersistOutcome::Created { photo_id, .. } => *photo_id,
            PersistOutcome::DuplicateSkipped { photo_id } => *photo_id,
        }
    }
    let created = outcomes
        .iter()
        .filter(|o| matches!(o, PersistOutcome::Created { .. }))
        .count();
    assert_eq!(created, 1, "exactly one committer wins: {outcomes:?}");
    assert_eq!(photo_id_of(&outcomes[0]), photo_id_of(&outcomes[1]));

    let (photo_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (quality_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quality_results")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(photo_rows, 1);
    assert_eq!(quality_rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn reserve_or_get_reports_created_exactly_once(pool: PgPool) {
    let input = sample_photo("img-reserve", None);
    let mut conn = pool.acquire().await.unwrap();

    let (first_id, created) = PhotoRepo::reserve_or_get(&mut conn, &input).await.unwrap();
    assert!(created);
    let (second_id, created_again) = PhotoRepo::reserve_or_get(&mut conn, &input).await.unwrap();
    assert!(!created_again);
    assert_eq!(first_id, second_id);
    drop(conn);

    let photo = PhotoRepo::get(&pool, first_id).await.unwrap().unwrap();
    assert_eq!(photo.source_image_id, "img-reserve");
    assert_eq!(photo.source, "mapillary");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn street_upsert_dedupes_without_toid(pool: PgPool) {
    let input = CreateStreet {
        toid: None,
        name: Some("High Street".to_string()),
        postcode_district: Some("EH1".to_string()),
        local_authority: Some("City of Edinburgh".to_string()),
        region: Some("Scotland".to_string()),
    };
    let first = StreetRepo::upsert(&pool, &input).await.unwrap();
    let second = StreetRepo::upsert(&pool, &input).await.unwrap();
    assert_eq!(first.id, second.id);

    // A different unnamed street still gets its own row.
    let other = CreateStreet {
        postcode_district: Some("EH2".to_string()),
        ..input.clone()
    };
    let third = StreetRepo::upsert(&pool, &other).await.unwrap();
    assert_ne!(third.id, first.id);

    let (street_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM streets")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(street_rows, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn point_upsert_is_idempotent_and_processing_stamp_sticks(pool: PgPool) {
    let input = CreateStreetPoint {
        street_id: None,
        toid: Some("osgb2000002".to_string()),
        latitude: 51.5,
        longitude: -0.1,
    };
    let first = StreetPointRepo::upsert(&pool, &input).await.unwrap();
    let second = StreetPointRepo::upsert(&pool, &input).await.unwrap();
    assert_eq!(first.id, second.id);

    let unprocessed = StreetPointRepo::list_unprocessed(&pool, 10).await.unwrap();
    assert_eq!(unprocessed.len(), 1);

    StreetPointRepo::mark_processed(&pool, first.id).await.unwrap();
    let unprocessed = StreetPointRepo::list_unprocessed(&pool, 10).await.unwrap();
    assert!(unprocessed.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn statistics_reflect_committed_rows(pool: PgPool) {
    let empty = StatsRepo::gather(&pool).await.unwrap();
    assert_eq!(empty.total_photos, 0);
    assert_eq!(empty.usable_photo_ratio, 0.0);

    let usable = PhotoTriple {
        photo: sample_photo("img-a", None),
        quality: usable_quality(),
        analysis: Some(sample_analysis()),
    };
    let rejected = PhotoTriple {
        photo: sample_photo("img-b", None),
        quality: rejected_quality(),
        analysis: None,
    };
    let (counts, _) = BatchWriter::commit_batch(&pool, &[usable, rejected]).await;
    assert_eq!(counts.processed, 2);

    assert_eq!(QualityResultRepo::count(&pool, false).await.unwrap(), 2);
    assert_eq!(QualityResultRepo::count(&pool, true).await.unwrap(), 1);

    let stats = StatsRepo::gather(&pool).await.unwrap();
    assert_eq!(stats.total_photos, 2);
    assert_eq!(stats.quality_assessed, 2);
    assert_eq!(stats.usable_photos, 1);
    assert_eq!(stats.road_analyzed, 1);
    assert!((stats.usable_photo_ratio - 0.5).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn replace_groups_swaps_the_whole_set(pool: PgPool) {
    let triple = PhotoTriple {
        photo: sample_photo("img-grouped", None),
        quality: usable_quality(),
        analysis: Some(sample_analysis()),
    };
    let PersistOutcome::Created {
        photo_id,
        quality_id,
        ..
    } = BatchWriter::commit_photo_result(&pool, &triple)
        .await
        .unwrap()
    else {
        panic!("expected Created");
    };

    let members = GroupRepo::list_usable_photo_analyses(&pool).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].photo_id, photo_id);

    let group = CreateGroup {
        latitude: 51.501,
        longitude: -0.142,
        tolerance_m: 5.0,
        avg_quality_score: 82.0,
        avg_road_score: 70.0,
        avg_crack_confidence: 0.3,
        avg_pothole_confidence: 0.1,
        avg_surface_roughness: 0.2,
        total_pothole_count: 0,
        dominant_quality_rating: "fair".to_string(),
        dominant_crack_severity: "minor".to_string(),
        dominant_surface_type: Some("asphalt".to_string()),
        members: vec![(photo_id, quality_id)],
    };
    GroupRepo::replace_groups(&pool, &[group.clone()]).await.unwrap();
    assert_eq!(GroupRepo::count(&pool).await.unwrap(), 1);

    // Re-running replaces rather than appends.
    GroupRepo::replace_groups(&pool, &[group]).await.unwrap();
    let groups = GroupRepo::list(&pool).await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].photo_count, 1);
    assert_eq!(groups[0].dominant_crack_severity, "minor");
}
