//! Street geometry source: feeds the collection phase with road links
//! and their name enrichment.

use async_trait::async_trait;
use kerb_core::geo::{haversine_m, BoundingBox};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::rate_limit::RateLimiter;

/// Features fetched per page.
const PAGE_SIZE: usize = 100;

/// One road link with its name enrichment and line geometry.
#[derive(Debug, Clone)]
pub struct StreetRecord {
    pub toid: Option<String>,
    pub name: Option<String>,
    pub postcode_district: Option<String>,
    pub local_authority: Option<String>,
    pub region: Option<String>,
    /// `(latitude, longitude)` vertices along the link.
    pub line: Vec<(f64, f64)>,
}

#[async_trait]
pub trait StreetDataSource: Send + Sync {
    /// All road links intersecting the bounding box.
    async fn fetch_streets(&self, bbox: &BoundingBox) -> Result<Vec<StreetRecord>, SourceError>;
}

/// Client for the OS features API (road-link collection).
pub struct OsFeaturesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: serde_json::Value,
}

impl OsFeaturesClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            limiter,
        }
    }

    fn record_from_feature(feature: &Feature) -> Option<StreetRecord> {
        let geometry = feature.geometry.as_ref()?;
        if geometry.kind != "LineString" {
            return None;
        }
        let coords = geometry.coordinates.as_array()?;
        let mut line = Vec::with_capacity(coords.len());
        for pair in coords {
            let pair = pair.as_array()?;
            let lon = pair.first()?.as_f64()?;
            let lat = pair.get(1)?.as_f64()?;
            line.push((lat, lon));
        }
        if line.is_empty() {
            return None;
        }

        let text = |key: &str| {
            feature
                .properties
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Some(StreetRecord {
            toid: text("toid"),
            name: text("name1"),
            postcode_district: text("postcode_district"),
            local_authority: text("local_authority"),
            region: text("region"),
            line,
        })
    }
}

#[async_trait]
impl StreetDataSource for OsFeaturesClient {
    #[instrument(skip_all)]
    async fn fetch_streets(&self, bbox: &BoundingBox) -> Result<Vec<StreetRecord>, SourceError> {
        let mut records = Vec::new();
        let mut offset = 0usize;
        loop {
            self.limiter.acquire().await;
            let response = self
                .http
                .get(format!("{}/collections/road-link/items", self.base_url))
                .query(&[
                    ("bbox", bbox.to_csv()),
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                    ("key", self.api_key.clone()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(SourceError::from_status(response.status(), "street features"));
            }
            let page: FeatureCollection = response.json().await?;
            let fetched = page.features.len();
            records.extend(page.features.iter().filter_map(Self::record_from_feature));
            debug!(offset, fetched, "fetched street feature page");
            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }
        Ok(records)
    }
}

/// Thin out a polyline to points at least `interval_m` apart, always
/// keeping the first vertex. Used to derive analysis points from link
/// geometry.
pub fn sample_line(line: &[(f64, f64)], interval_m: f64) -> Vec<(f64, f64)> {
    let mut sampled = Vec::new();
    let mut last: Option<(f64, f64)> = None;
    for &(lat, lon) in line {
        let keep = match last {
            None => true,
            Some((plat, plon)) => haversine_m(plat, plon, lat, lon) >= interval_m,
        };
        if keep {
            sampled.push((lat, lon));
            last = Some((lat, lon));
        }
    }
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_line_keeps_first_and_spaced_points() {
        // Roughly 11m apart per 0.0001 degrees of latitude.
        let line: Vec<(f64, f64)> = (0..10).map(|i| (51.5 + i as f64 * 1e-4, -0.1)).collect();
        let sampled = sample_line(&line, 20.0);
        assert_eq!(sampled[0], (51.5, -0.1));
        assert!(sampled.len() < line.len());
        for pair in sampled.windows(2) {
            let d = haversine_m(pair[0].0, pair[0].1, pair[1].0, pair[1].1);
            assert!(d >= 20.0, "points only {d:.1}m apart");
        }
    }

    #[test]
    fn sample_line_empty_input() {
        assert!(sample_line(&[], 20.0).is_empty());
    }

    #[test]
    fn record_from_feature_parses_line_string() {
        let feature: Feature = serde_json::from_value(serde_json::json!({
            "properties": {
                "toid": "osgb4000000031043205",
                "name1": "Abbey Road",
                "region": "London"
            },
            "geometry": {
                "type": "LineString",
                "coordinates": [[-0.1, 51.5], [-0.101, 51.5008]]
            }
        }))
        .unwrap();
        let record = OsFeaturesClient::record_from_feature(&feature).unwrap();
        assert_eq!(record.toid.as_deref(), Some("osgb4000000031043205"));
        assert_eq!(record.name.as_deref(), Some("Abbey Road"));
        assert_eq!(record.line, vec![(51.5, -0.1), (51.5008, -0.101)]);
    }

    #[test]
    fn record_from_feature_rejects_non_line_geometry() {
        let feature: Feature = serde_json::from_value(serde_json::json!({
            "properties": {},
            "geometry": { "type": "Point", "coordinates": [-0.1, 51.5] }
        }))
        .unwrap();
        assert!(OsFeaturesClient::record_from_feature(&feature).is_none());
    }
}
