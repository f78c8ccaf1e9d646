//! Orchestration of the photo analysis pipeline: fetch candidates per
//! street point, gate them on quality, score the survivors, and commit
//! each photo's results atomically.

pub mod aggregate;
pub mod outcome;
pub mod orchestrator;
pub mod store;

pub use orchestrator::{AnalysisPipeline, PipelineConfig};
pub use outcome::{AreaAnalysisReport, DataAvailability, ErrorKind, PhotoOutcome, PointOutcome};
pub use store::{PgPipelineStore, PipelineStore};
