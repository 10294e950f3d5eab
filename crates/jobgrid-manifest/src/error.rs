//! Manifest processing error types.

use jobgrid_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("descriptor is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("failed to parse descriptor: {0}")]
    Parse(String),

    #[error("descriptor is empty")]
    EmptyDescriptor,

    #[error("descriptor declares no components")]
    NoComponents,

    #[error("component #{0} has no name")]
    UnnamedComponent(usize),

    #[error("manifest #{index} has no metadata")]
    MissingMetadata { index: usize },

    #[error("manifest #{index} has no string metadata.name")]
    InvalidName { index: usize },

    #[error("failed to serialize manifest {name}: {reason}")]
    Serialize { name: String, reason: String },
}

impl ManifestError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

pub type ManifestResult<T> = Result<T, ManifestError>;
