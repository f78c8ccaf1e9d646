//! Pure domain logic for the road-condition photo pipeline.
//!
//! No database or network access lives here: geometry and identity
//! normalization, the quality-gate decision logic, and the mapping from
//! raw scorer output to road-condition metrics are all pure functions
//! over their inputs, parameterized by configuration structs.

pub mod error;
pub mod geo;
pub mod heuristics;
pub mod identity;
pub mod quality;
pub mod road;
pub mod types;
