use thiserror::Error;

use crate::models::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlannerError {
    #[error("time conflict: activity '{activity_name}' runs from {start} to {end}")]
    Conflict {
        activity_name: String,
        start: TimeOfDay,
        end: TimeOfDay,
    },
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PlannerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    /// Upstream failures are absorbed by fallbacks and never reach end users.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::MalformedUpstreamResponse(_)
        )
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
