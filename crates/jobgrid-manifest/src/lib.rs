//! jobgrid-manifest — application descriptors and their manifests.
//!
//! A descriptor is a single YAML stream: the first document is the
//! application header (name, components, policies) and every following
//! document is a Kubernetes-style manifest. [`ManifestProcessor`] picks out
//! the manifests each component references and checks them against the
//! closed kind vocabulary in [`schema`].

pub mod descriptor;
pub mod error;
pub mod processor;
pub mod schema;

pub use descriptor::{AppDescriptor, Component, ManifestRef, parse_descriptor};
pub use error::{ManifestError, ManifestResult};
pub use processor::ManifestProcessor;
pub use schema::{ObjectKind, SchemaError};
