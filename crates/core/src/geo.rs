//! WGS84 coordinate handling: bounding boxes, point validation, and the
//! distance math used for spatial clustering.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Mean Earth radius in meters (IUGG value).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters per degree of latitude (approximately constant on WGS84).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Validate a WGS84 coordinate pair.
pub fn validate_wgs84(latitude: f64, longitude: f64) -> Result<(), CoreError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::Validation(format!(
            "Latitude must be between -90 and 90, got {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::Validation(format!(
            "Longitude must be between -180 and 180, got {longitude}"
        )));
    }
    Ok(())
}

/// An axis-aligned WGS84 bounding box.
///
/// Field order matches the `[min_lon, min_lat, max_lon, max_lat]`
/// convention used by the OS Features and Mapillary APIs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a validated bounding box.
    pub fn new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, CoreError> {
        validate_wgs84(min_lat, min_lon)?;
        validate_wgs84(max_lat, max_lon)?;
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(CoreError::Validation(format!(
                "Bounding box minimums must be strictly below maximums, \
                 got [{min_lon}, {min_lat}, {max_lon}, {max_lat}]"
            )));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Build a bounding box of `radius_m` meters around a point.
    ///
    /// Uses the local meters-per-degree approximation, which is accurate
    /// to well under a meter at the radii used here (tens of meters).
    pub fn around_point(latitude: f64, longitude: f64, radius_m: f64) -> Result<Self, CoreError> {
        validate_wgs84(latitude, longitude)?;
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Radius must be positive, got {radius_m}"
            )));
        }
        let dlat = radius_m / METERS_PER_DEG_LAT;
        let dlon = radius_m / (METERS_PER_DEG_LAT * latitude.to_radians().cos().abs().max(1e-6));
        Self::new(
            (longitude - dlon).max(-180.0),
            (latitude - dlat).max(-90.0),
            (longitude + dlon).min(180.0),
            (latitude + dlat).min(90.0),
        )
    }

    /// Whether the box contains the given point (inclusive edges).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lon
            && longitude <= self.max_lon
    }

    /// Split the box into `n` equal-width longitude strips.
    ///
    /// Strips are disjoint apart from their shared edges, so work
    /// partitioned this way never hands the same interior point to two
    /// workers.
    pub fn split_lon(&self, n: usize) -> Vec<BoundingBox> {
        let n = n.max(1);
        let step = (self.max_lon - self.min_lon) / n as f64;
        (0..n)
            .map(|i| {
                let min_lon = self.min_lon + step * i as f64;
                let max_lon = if i == n - 1 {
                    self.max_lon
                } else {
                    self.min_lon + step * (i + 1) as f64
                };
                BoundingBox {
                    min_lon,
                    min_lat: self.min_lat,
                    max_lon,
                    max_lat: self.max_lat,
                }
            })
            .collect()
    }

    /// Comma-separated `min_lon,min_lat,max_lon,max_lat` form used in
    /// query strings by both upstream APIs.
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Great-circle distance in meters between two WGS84 points (haversine).
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
