//! jobgrid-core — shared plumbing for the jobgrid job manager.
//!
//! Holds the service configuration ([`JobgridConfig`]), the outbound
//! HTTP client used to reach the matchmaking and policy manager
//! collaborators, and the error taxonomy every service error maps into.

pub mod config;
pub mod error;
pub mod http;

pub use config::JobgridConfig;
pub use error::ErrorKind;
pub use http::{HttpClient, HttpError, HttpResponse};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
