//! jobgrid-scheduler — the per-job lifecycle.
//!
//! Drivers discover work through the lease query, claim a job with a
//! conditional write, and report the observed resource back. The policy
//! service re-arms finished jobs for remediation through the same
//! [`JobService`].
//!
//! ```text
//! Created ──claim──▶ Progressing ──report──▶ Finished | Degraded
//!    ▲                                          │
//!    └──────────── remediation re-arm ──────────┘
//! ```

pub mod error;
pub mod job_service;
pub mod lease;
pub mod resource_service;

pub use error::{SchedulerError, SchedulerResult};
pub use job_service::JobService;
pub use lease::LeaseConfig;
pub use resource_service::ResourceService;
