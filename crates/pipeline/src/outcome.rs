//! Outcome types reported by a pipeline run.
//!
//! Failures are classified, not just stringly logged: the error kind
//! determines whether a retry is worth scheduling, and the per-photo
//! outcomes roll up into the area report the operator sees.

use kerb_core::types::DbId;
use kerb_db::batch::BatchCounts;
use kerb_sources::SourceError;
use serde::Serialize;

/// Classified failure cause for one photo or point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream has no data here (no photos, no download URL).
    MissingData,
    /// Network-level failure that usually clears on retry.
    TransientNetwork,
    /// Upstream quota exhausted; retry after backoff.
    RateLimited,
    /// The scoring model saw the image and failed on it.
    ModelError,
    /// Our side is broken (database down, invariant violated). Aborts
    /// the run rather than burning through the remaining points.
    SystemError,
}

impl ErrorKind {
    /// Operator-facing guidance attached to failure logs.
    pub fn recommendation(&self) -> &'static str {
        match self {
            ErrorKind::MissingData => "no action needed; coverage gap in the source",
            ErrorKind::TransientNetwork => "retry the run; failure should clear",
            ErrorKind::RateLimited => "wait for the quota window and retry",
            ErrorKind::ModelError => "inspect the scorer service logs",
            ErrorKind::SystemError => "check credentials and database health before retrying",
        }
    }

    /// Whether re-running the same input can succeed without human help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientNetwork | ErrorKind::RateLimited)
    }
}

impl From<&SourceError> for ErrorKind {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::RateLimited => ErrorKind::RateLimited,
            SourceError::Transient(_) | SourceError::Transport(_) => ErrorKind::TransientNetwork,
            // A rejected credential fails every subsequent request, so it
            // is an operator problem, not a coverage gap.
            SourceError::Denied(_) => ErrorKind::SystemError,
            SourceError::InvalidResponse(_) => ErrorKind::MissingData,
            SourceError::Model(_) => ErrorKind::ModelError,
        }
    }
}

/// What happened to one candidate photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PhotoOutcome {
    /// Photo and quality result committed; `analyzed` means an analysis
    /// row went with them.
    Committed {
        photo_id: DbId,
        usable: bool,
        analyzed: bool,
    },
    /// Already in the database; nothing written.
    Duplicate { photo_id: DbId },
    /// Nothing persisted for this photo.
    Failed { kind: ErrorKind, detail: String },
}

/// Terminal status of one street point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Completed,
    /// The source had no imagery near this point.
    NoPhotos,
    Failed,
}

/// Per-point rollup.
#[derive(Debug, Clone, Serialize)]
pub struct PointOutcome {
    pub point_id: DbId,
    pub status: PointStatus,
    pub photos: Vec<PhotoOutcome>,
}

/// Result of a pre-flight availability check for an area.
///
/// An empty area is a data gap, not a failure: storage answered, there
/// is just nothing to do until collection has run here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataAvailability {
    pub points_in_area: i64,
    pub ready: bool,
}

impl DataAvailability {
    pub fn recommendation(&self) -> &'static str {
        if self.ready {
            "area has street points; analysis can proceed"
        } else {
            "no street points here; run the collection phase for this area first"
        }
    }
}

/// Full report for one area analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AreaAnalysisReport {
    pub success: bool,
    pub cancelled: bool,
    pub counts: BatchCounts,
    pub points: Vec<PointOutcome>,
    pub groups_written: usize,
    /// Set when the run aborted on a system error.
    pub error: Option<String>,
}

impl AreaAnalysisReport {
    pub(crate) fn aborted(partial: Vec<PointOutcome>, counts: BatchCounts, error: String) -> Self {
        Self {
            success: false,
            cancelled: false,
            counts,
            points: partial,
            groups_written: 0,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_to_kinds() {
        assert_eq!(ErrorKind::from(&SourceError::RateLimited), ErrorKind::RateLimited);
        assert_eq!(
            ErrorKind::from(&SourceError::Transient("502".into())),
            ErrorKind::TransientNetwork
        );
        assert_eq!(
            ErrorKind::from(&SourceError::InvalidResponse("no url".into())),
            ErrorKind::MissingData
        );
        assert_eq!(
            ErrorKind::from(&SourceError::Model("oom".into())),
            ErrorKind::ModelError
        );
        assert_eq!(
            ErrorKind::from(&SourceError::Denied("403".into())),
            ErrorKind::SystemError
        );
    }

    #[test]
    fn only_network_kinds_are_retryable() {
        assert!(ErrorKind::TransientNetwork.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::MissingData.is_retryable());
        assert!(!ErrorKind::ModelError.is_retryable());
        assert!(!ErrorKind::SystemError.is_retryable());
    }

    #[test]
    fn every_kind_has_a_recommendation() {
        for kind in [
            ErrorKind::MissingData,
            ErrorKind::TransientNetwork,
            ErrorKind::RateLimited,
            ErrorKind::ModelError,
            ErrorKind::SystemError,
        ] {
            assert!(!kind.recommendation().is_empty());
        }
    }
}
