//! Photo imagery sources.
//!
//! The pipeline asks for photos near a point, then downloads the bytes
//! of each candidate separately so a bad download only loses one photo.

use async_trait::async_trait;
use kerb_core::geo::BoundingBox;
use kerb_core::identity::{parse_capture_time, validate_compass_angle, SOURCE_MAPILLARY};
use kerb_core::types::Timestamp;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::SourceError;
use crate::rate_limit::RateLimiter;

/// Metadata for one candidate photo, normalized across platforms.
#[derive(Debug, Clone)]
pub struct PhotoMetadata {
    pub source: String,
    pub source_image_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub captured_at: Option<Timestamp>,
    pub compass_angle: Option<f64>,
    /// Platform-specific URL the bytes can be fetched from.
    pub download_url: Option<String>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Platform identifier, matching the `image_source` enum values.
    fn source_name(&self) -> &'static str;

    /// Up to `limit` photos within `radius_m` of the point.
    async fn photos_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<PhotoMetadata>, SourceError>;

    /// Download the image bytes for one candidate.
    async fn download(&self, photo: &PhotoMetadata) -> Result<Vec<u8>, SourceError>;
}

/// Client for the Mapillary Graph API.
pub struct MapillaryClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    limiter: Arc<RateLimiter>,
}

const MAPILLARY_BASE_URL: &str = "https://graph.mapillary.com";
const IMAGE_FIELDS: &str = "id,computed_geometry,captured_at,compass_angle,thumb_1024_url";

#[derive(Debug, Deserialize)]
struct ImagePage {
    #[serde(default)]
    data: Vec<MapillaryImage>,
}

#[derive(Debug, Deserialize)]
struct MapillaryImage {
    id: String,
    computed_geometry: Option<PointGeometry>,
    #[serde(default)]
    captured_at: serde_json::Value,
    compass_angle: Option<f64>,
    thumb_1024_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    /// `[longitude, latitude]`
    coordinates: [f64; 2],
}

impl MapillaryClient {
    pub fn new(access_token: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self::with_base_url(MAPILLARY_BASE_URL, access_token, limiter)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
            limiter,
        }
    }

    fn metadata_from_image(image: &MapillaryImage) -> PhotoMetadata {
        let (latitude, longitude) = match &image.computed_geometry {
            Some(geometry) => {
                let [lon, lat] = geometry.coordinates;
                (Some(lat), Some(lon))
            }
            None => (None, None),
        };
        PhotoMetadata {
            source: SOURCE_MAPILLARY.to_string(),
            source_image_id: image.id.clone(),
            latitude,
            longitude,
            captured_at: parse_capture_time(&image.captured_at),
            compass_angle: image.compass_angle.and_then(validate_compass_angle),
            download_url: image.thumb_1024_url.clone(),
        }
    }
}

#[async_trait]
impl ImageSource for MapillaryClient {
    fn source_name(&self) -> &'static str {
        SOURCE_MAPILLARY
    }

    #[instrument(skip(self))]
    async fn photos_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        limit: usize,
    ) -> Result<Vec<PhotoMetadata>, SourceError> {
        let bbox = BoundingBox::around_point(latitude, longitude, radius_m)
            .map_err(|err| SourceError::InvalidResponse(err.to_string()))?;

        self.limiter.acquire().await;
        let bbox_csv = bbox.to_csv();
        let limit_param = limit.to_string();
        let response = self
            .http
            .get(format!("{}/images", self.base_url))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("fields", IMAGE_FIELDS),
                ("bbox", bbox_csv.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status(), "image search"));
        }

        let page: ImagePage = response.json().await?;
        debug!(candidates = page.data.len(), "image search returned");
        Ok(page.data.iter().map(Self::metadata_from_image).collect())
    }

    async fn download(&self, photo: &PhotoMetadata) -> Result<Vec<u8>, SourceError> {
        let url = photo.download_url.as_deref().ok_or_else(|| {
            SourceError::InvalidResponse(format!("image {} has no download url", photo.source_image_id))
        })?;

        self.limiter.acquire().await;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            warn!(image = %photo.source_image_id, status = %response.status(), "image download failed");
            return Err(SourceError::from_status(response.status(), "image download"));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_normalizes_geometry_and_capture_time() {
        let image: MapillaryImage = serde_json::from_value(json!({
            "id": "1829174560",
            "computed_geometry": { "type": "Point", "coordinates": [-3.1883, 55.9533] },
            "captured_at": 1_700_000_000_000i64,
            "compass_angle": 182.5,
            "thumb_1024_url": "https://example.test/thumb.jpg"
        }))
        .unwrap();
        let meta = MapillaryClient::metadata_from_image(&image);
        assert_eq!(meta.source, "mapillary");
        assert_eq!(meta.latitude, Some(55.9533));
        assert_eq!(meta.longitude, Some(-3.1883));
        assert_eq!(meta.compass_angle, Some(182.5));
        assert!(meta.captured_at.is_some());
        assert!(meta.download_url.is_some());
    }

    #[test]
    fn metadata_drops_invalid_compass_and_missing_fields() {
        let image: MapillaryImage = serde_json::from_value(json!({
            "id": "99",
            "compass_angle": 540.0
        }))
        .unwrap();
        let meta = MapillaryClient::metadata_from_image(&image);
        assert_eq!(meta.latitude, None);
        assert_eq!(meta.compass_angle, None);
        assert_eq!(meta.captured_at, None);
        assert_eq!(meta.download_url, None);
    }
}
