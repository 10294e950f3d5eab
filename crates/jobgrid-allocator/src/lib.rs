//! jobgrid-allocator — placement decisions from the matchmaking service.
//!
//! [`Allocator::allocate`] sends one descriptor to the matchmaker and
//! folds the response back into it; [`assign_targets`] turns a
//! component's placement payload into a job's target and orchestrator.

pub mod allocator;
pub mod client;
pub mod error;
pub mod request;
pub mod targets;

pub use allocator::Allocator;
pub use client::{HttpMatchmakingClient, MatchmakingClient};
pub use error::{AllocatorError, AllocatorResult};
pub use request::{AllocationOption, AllocationRequest};
pub use targets::{TargetPayload, assign_targets};
