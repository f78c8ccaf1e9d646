//! Photo identity: source platforms, the dedup key, and normalization of
//! the metadata that arrives alongside a source image.

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Source platform constants
// ---------------------------------------------------------------------------

pub const SOURCE_MAPILLARY: &str = "mapillary";
pub const SOURCE_STREETVIEW: &str = "streetview";
pub const SOURCE_MANUAL_UPLOAD: &str = "manual_upload";

/// All valid source platforms (matches the `image_source` enum type).
pub const VALID_SOURCES: &[&str] = &[SOURCE_MAPILLARY, SOURCE_STREETVIEW, SOURCE_MANUAL_UPLOAD];

/// Validate that a source string is one of the known platforms.
pub fn validate_source(source: &str) -> Result<(), CoreError> {
    if VALID_SOURCES.contains(&source) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown image source: '{source}'. Valid sources: {}",
            VALID_SOURCES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Dedup key
// ---------------------------------------------------------------------------

/// The identity of one source image: `(source, source_image_id)`.
///
/// This pair is unique per platform and is the only dedup key the
/// persistence layer trusts; location/time similarity is never used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub source: String,
    pub source_image_id: String,
}

impl DedupKey {
    pub fn new(source: &str, source_image_id: &str) -> Result<Self, CoreError> {
        validate_source(source)?;
        if source_image_id.is_empty() {
            return Err(CoreError::Validation(
                "source_image_id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            source_image_id: source_image_id.to_string(),
        })
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.source_image_id)
    }
}

// ---------------------------------------------------------------------------
// Metadata normalization
// ---------------------------------------------------------------------------

/// Validate a compass angle, returning it only if it lies in `[0, 360)`.
///
/// Upstream metadata occasionally carries garbage here; an out-of-range
/// angle is dropped rather than wrapped, matching what the collection
/// phase stores.
pub fn validate_compass_angle(angle: f64) -> Option<f64> {
    if angle.is_finite() && (0.0..360.0).contains(&angle) {
        Some(angle)
    } else {
        None
    }
}

/// Parse a capture time that may be an epoch-milliseconds number or an
/// RFC 3339 string. Mapillary sends epoch millis; other sources send
/// ISO strings. Returns `None` for anything unparseable.
pub fn parse_capture_time(raw: &serde_json::Value) -> Option<Timestamp> {
    match raw {
        serde_json::Value::Number(n) => {
            let millis = n.as_i64()?;
            chrono::Utc.timestamp_millis_opt(millis).single()
        }
        serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_sources_accepted() {
        assert!(validate_source("mapillary").is_ok());
        assert!(validate_source("streetview").is_ok());
        assert!(validate_source("manual_upload").is_ok());
    }

    #[test]
    fn unknown_source_rejected() {
        assert!(validate_source("flickr").is_err());
        assert!(validate_source("").is_err());
    }

    #[test]
    fn dedup_key_requires_image_id() {
        assert!(DedupKey::new("mapillary", "").is_err());
        let key = DedupKey::new("mapillary", "123456789").unwrap();
        assert_eq!(key.to_string(), "mapillary:123456789");
    }

    #[test]
    fn compass_angle_bounds() {
        assert_eq!(validate_compass_angle(0.0), Some(0.0));
        assert_eq!(validate_compass_angle(359.99), Some(359.99));
        assert_eq!(validate_compass_angle(360.0), None);
        assert_eq!(validate_compass_angle(-1.0), None);
        assert_eq!(validate_compass_angle(f64::NAN), None);
    }

    #[test]
    fn capture_time_from_epoch_millis() {
        let ts = parse_capture_time(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn capture_time_from_rfc3339() {
        let ts = parse_capture_time(&json!("2024-05-01T12:30:00Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn capture_time_garbage_is_none() {
        assert!(parse_capture_time(&json!("yesterday")).is_none());
        assert!(parse_capture_time(&json!(null)).is_none());
        assert!(parse_capture_time(&json!({"at": 1})).is_none());
    }
}
