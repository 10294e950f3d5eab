//! Job group service error types.

use jobgrid_allocator::AllocatorError;
use jobgrid_core::ErrorKind;
use jobgrid_manifest::ManifestError;
use jobgrid_scheduler::SchedulerError;
use jobgrid_state::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("job group not found: {0}")]
    GroupNotFound(String),

    #[error("job group {id} cannot be {action}: {reason}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::GroupNotFound(_) => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::Manifest(e) => e.kind(),
            Self::Allocator(e) => e.kind(),
            Self::Scheduler(e) => e.kind(),
            Self::State(e) => e.kind(),
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
