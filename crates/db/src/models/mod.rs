//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//!   (spatial columns are selected as `ST_Y(...)/ST_X(...)` aliases)
//! - A create DTO for inserts

pub mod group;
pub mod photo;
pub mod quality;
pub mod road_analysis;
pub mod stats;
pub mod street;
