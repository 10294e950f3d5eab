//! jobgrid-policy — the policy side of the job manager.
//!
//! Inbound: an incompliance notification names a resource and a
//! remediation; [`PolicyService`] turns it into a pending [`Remediation`]
//! and re-arms the job that owns the resource.
//!
//! Outbound: after a job group is created the policy manager is told
//! about it through a [`PolicyManagerClient`], with a callback pointing
//! back at the incompliance endpoint.
//!
//! [`Remediation`]: jobgrid_state::Remediation

pub mod error;
pub mod incompliance;
pub mod notifier;
pub mod service;

pub use error::{PolicyError, PolicyResult};
pub use incompliance::Incompliance;
pub use notifier::{Action, HttpPolicyManager, Notification, PolicyManagerClient};
pub use service::PolicyService;
