use rescuelink_generator::GeneratorError;
use rescuelink_geo::PositionError;
use thiserror::Error;

/// Why a refresh degraded. Never surfaced to callers; each variant is logged
/// and recovered inside the refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("position unavailable: {0}")]
    PositionUnavailable(#[from] PositionError),

    #[error("candidate fetch failed: {0}")]
    CandidateFetchFailed(#[from] GeneratorError),

    #[error("no candidate matched the criteria")]
    NoCandidatesMatched,

    #[error("refresh task aborted: {0}")]
    TaskFailed(String),
}

impl RefreshError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::PositionUnavailable(_) => "position_unavailable",
            RefreshError::CandidateFetchFailed(_) => "candidate_fetch_failed",
            RefreshError::NoCandidatesMatched => "no_candidates_matched",
            RefreshError::TaskFailed(_) => "task_failed",
        }
    }
}
