//! Street and street-point models.

use kerb_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `streets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Street {
    pub id: DbId,
    pub toid: Option<String>,
    pub name: Option<String>,
    pub postcode_district: Option<String>,
    pub local_authority: Option<String>,
    pub region: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for creating a street.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStreet {
    pub toid: Option<String>,
    pub name: Option<String>,
    pub postcode_district: Option<String>,
    pub local_authority: Option<String>,
    pub region: Option<String>,
}

/// A row from the `street_points` table, with the location unpacked
/// into latitude/longitude.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StreetPoint {
    pub id: DbId,
    pub street_id: Option<DbId>,
    pub toid: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub processed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for creating a street point.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStreetPoint {
    pub street_id: Option<DbId>,
    pub toid: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}
