//! Error categories shared by every jobgrid service.

use std::fmt;

/// Coarse classification of a service failure.
///
/// Each crate keeps its own error enum; `kind()` on those enums maps a
/// concrete failure into one of these so the HTTP layer can pick a
/// status code without knowing every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any persistence access.
    Validation,
    /// The entity exists but is not in a state that allows the operation.
    Conflict,
    /// Unknown job, job group, or resource.
    NotFound,
    /// Matchmaking or policy manager failure (non-2xx or transport).
    External,
    /// Storage failure.
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not found",
            Self::External => "external",
            Self::Persistence => "persistence",
        };
        f.write_str(s)
    }
}
