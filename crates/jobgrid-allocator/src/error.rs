//! Allocator error types.

use jobgrid_core::{ErrorKind, HttpError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("invalid allocation request: {0}")]
    InvalidRequest(String),

    #[error("matchmaking returned {status}: {body}")]
    Matchmaking { status: u16, body: String },

    #[error("matchmaking unreachable: {0}")]
    Transport(#[from] HttpError),

    #[error("failed to decode allocation response: {0}")]
    Decode(String),

    #[error("unexpected target payload: {0}")]
    UnexpectedTargetShape(String),
}

impl AllocatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::Matchmaking { .. }
            | Self::Transport(_)
            | Self::Decode(_)
            | Self::UnexpectedTargetShape(_) => ErrorKind::External,
        }
    }
}

pub type AllocatorResult<T> = Result<T, AllocatorError>;
