//! Photo model: one row per distinct source image.

use kerb_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `photos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Photo {
    pub id: DbId,
    pub street_point_id: Option<DbId>,
    pub source: String,
    pub source_image_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub captured_at: Option<Timestamp>,
    pub compass_angle: Option<f64>,
    pub created_at: Timestamp,
}

/// DTO for creating a photo.
///
/// `(source, source_image_id)` is the dedup key; inserting a duplicate
/// is an expected no-op, never an error.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePhoto {
    pub street_point_id: Option<DbId>,
    pub source: String,
    pub source_image_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub captured_at: Option<Timestamp>,
    pub compass_angle: Option<f64>,
}
