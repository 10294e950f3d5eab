//! Job service error types.

use jobgrid_core::ErrorKind;
use jobgrid_state::JobState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("job cannot be promoted: job {id} is {state}")]
    JobCannotBePromoted { id: String, state: JobState },

    #[error("job {id} cannot be {action}: {reason}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        reason: String,
    },

    #[error("report for job {id} rejected ({reason}), job marked Degraded")]
    ReportRejected { id: String, reason: String },

    #[error("state store error: {0}")]
    State(#[from] jobgrid_state::StateError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::JobNotFound(_) | Self::ResourceNotFound(_) => ErrorKind::NotFound,
            Self::JobCannotBePromoted { .. }
            | Self::InvalidTransition { .. }
            | Self::ReportRejected { .. } => ErrorKind::Conflict,
            Self::State(e) => e.kind(),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
