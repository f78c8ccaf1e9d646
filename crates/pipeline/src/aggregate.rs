//! Phase-2 aggregation: cluster usable photos by proximity and roll up
//! per-group condition summaries.
//!
//! Clustering is greedy seed-based: the first unassigned photo seeds a
//! group and collects everything within the tolerance of that seed.
//! Results depend only on input order, which the store returns sorted by
//! photo id, so rebuilds are deterministic.

use kerb_core::geo::haversine_m;
use kerb_db::models::group::{CreateGroup, UsablePhotoAnalysis};

/// Settings for the aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingConfig {
    /// Photos within this distance of a group's seed belong to it.
    /// Tighter than the fetch radius: a group should describe one spot
    /// of road, not everything a point's search circle caught.
    pub tolerance_m: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self { tolerance_m: 5.0 }
    }
}

/// Partition photos into proximity clusters. Each photo lands in exactly
/// one cluster; every cluster is non-empty.
pub fn cluster_photos<'a>(
    photos: &'a [UsablePhotoAnalysis],
    cfg: &GroupingConfig,
) -> Vec<Vec<&'a UsablePhotoAnalysis>> {
    let mut assigned = vec![false; photos.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..photos.len() {
        if assigned[seed_idx] {
            continue;
        }
        let seed = &photos[seed_idx];
        let mut cluster = Vec::new();
        for (idx, photo) in photos.iter().enumerate().skip(seed_idx) {
            if assigned[idx] {
                continue;
            }
            let distance = haversine_m(
                seed.latitude,
                seed.longitude,
                photo.latitude,
                photo.longitude,
            );
            if distance <= cfg.tolerance_m {
                assigned[idx] = true;
                cluster.push(photo);
            }
        }
        clusters.push(cluster);
    }

    clusters
}

/// Roll one cluster up into a group row.
///
/// Dominant categories are the most frequent value among members; ties
/// break toward the value seen first.
pub fn summarize_cluster(members: &[&UsablePhotoAnalysis], cfg: &GroupingConfig) -> CreateGroup {
    let n = members.len().max(1) as f64;
    let mean = |f: fn(&UsablePhotoAnalysis) -> f64| members.iter().map(|m| f(m)).sum::<f64>() / n;

    CreateGroup {
        latitude: mean(|m| m.latitude),
        longitude: mean(|m| m.longitude),
        tolerance_m: cfg.tolerance_m,
        avg_quality_score: mean(|m| m.quality_score),
        avg_road_score: mean(|m| m.road_score),
        avg_crack_confidence: mean(|m| m.crack_confidence),
        avg_pothole_confidence: mean(|m| m.pothole_confidence),
        avg_surface_roughness: mean(|m| m.surface_roughness),
        total_pothole_count: members.iter().map(|m| m.pothole_count).sum(),
        dominant_quality_rating: dominant(members.iter().map(|m| m.quality_rating.as_str())),
        dominant_crack_severity: dominant(members.iter().map(|m| m.crack_severity.as_str())),
        dominant_surface_type: dominant_optional(
            members.iter().filter_map(|m| m.surface_type.as_deref()),
        ),
        members: members
            .iter()
            .map(|m| (m.photo_id, m.quality_result_id))
            .collect(),
    }
}

/// Cluster and summarize in one step, ready for the store's wholesale
/// group replacement.
pub fn build_groups(photos: &[UsablePhotoAnalysis], cfg: &GroupingConfig) -> Vec<CreateGroup> {
    cluster_photos(photos, cfg)
        .iter()
        .map(|cluster| summarize_cluster(cluster, cfg))
        .collect()
}

fn dominant<'a>(values: impl Iterator<Item = &'a str>) -> String {
    dominant_optional(values).unwrap_or_default()
}

fn dominant_optional<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for value in values {
        match order.iter().position(|&v| v == value) {
            Some(idx) => counts[idx] += 1,
            None => {
                order.push(value);
                counts.push(1);
            }
        }
    }
    let best = counts.iter().enumerate().max_by(|a, b| {
        // First-seen wins ties.
        a.1.cmp(b.1).then(b.0.cmp(&a.0))
    })?;
    Some(order[best.0].to_string())
}
