//! jobgrid-orchestrator — the job group pipeline.
//!
//! [`JobGroupService`] turns an application descriptor into a persisted
//! group of jobs (allocate, extract manifests, assign targets, save) and
//! drives group-wide transitions afterwards: start, stop (undeploy),
//! replace, delete, and single-job reallocation.

pub mod error;
pub mod service;

pub use error::{OrchestratorError, OrchestratorResult};
pub use service::JobGroupService;
