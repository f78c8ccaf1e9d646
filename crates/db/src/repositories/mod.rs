//! Query methods, one module per table.

pub mod group_repo;
pub mod photo_repo;
pub mod quality_result_repo;
pub mod road_analysis_repo;
pub mod stats_repo;
pub mod street_point_repo;
pub mod street_repo;
