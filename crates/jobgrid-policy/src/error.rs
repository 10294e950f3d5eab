//! Policy service error types.

use jobgrid_core::{ErrorKind, HttpError};
use jobgrid_scheduler::SchedulerError;
use jobgrid_state::JobState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid incompliance notification: {0}")]
    InvalidNotification(String),

    #[error("unknown remediation type: {0:?}")]
    UnknownRemediation(String),

    #[error("incompliance notification names no resource")]
    MissingSubject,

    #[error("job {job_id} has no owner and cannot be remediated")]
    JobUnowned { job_id: String },

    #[error("job {job_id} cannot be remediated; expected state Finished, got {state}")]
    JobNotFinished { job_id: String, state: JobState },

    #[error("job {job_id} has no resource to remediate")]
    JobWithoutResource { job_id: String },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("failed to encode notification: {0}")]
    Encode(String),

    #[error("policy manager returned {status}: {body}")]
    PolicyManager { status: u16, body: String },

    #[error("policy manager unreachable: {0}")]
    Transport(#[from] HttpError),
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidNotification(_)
            | Self::UnknownRemediation(_)
            | Self::MissingSubject
            | Self::JobUnowned { .. }
            | Self::JobNotFinished { .. }
            | Self::JobWithoutResource { .. } => ErrorKind::Validation,
            Self::Scheduler(e) => e.kind(),
            Self::Encode(_) => ErrorKind::Persistence,
            Self::PolicyManager { .. } | Self::Transport(_) => ErrorKind::External,
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
