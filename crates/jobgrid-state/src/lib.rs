//! jobgrid-state — entity model and persistence for jobgrid.
//!
//! Backed by [redb](https://docs.rs/redb). Domain types are JSON-serialized
//! into `&[u8]` value columns; child rows (`{resource_id}:{seq}`) sit in
//! their own tables so conditions can be replaced and deletes cascade
//! without rewriting the parent.
//!
//! Services talk to storage through the repository traits in
//! [`repository`]. `StateStore` implements all of them and is `Clone` +
//! `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod repository;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use repository::{JobGroupRepository, JobRepository, PolicyRepository, ResourceRepository};
pub use store::StateStore;
pub use types::*;
