//! External data-source clients: street geometry, photo imagery, and the
//! road-condition scoring model.
//!
//! Each capability is a trait so the pipeline can run against test
//! doubles; the concrete clients here speak HTTP with shared client-side
//! rate limiting.

pub mod error;
pub mod images;
pub mod rate_limit;
pub mod scorer;
pub mod street_data;

pub use error::SourceError;
