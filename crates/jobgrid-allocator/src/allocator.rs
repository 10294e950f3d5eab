//! Allocator — one matchmaking round trip per call.

use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use jobgrid_manifest::{AppDescriptor, Component};
use jobgrid_state::{Job, Policy};

use crate::client::MatchmakingClient;
use crate::error::{AllocatorError, AllocatorResult};
use crate::request::{AllocationOption, AllocationRequest};
use crate::targets;

/// The subset of a descriptor the matchmaker may send back. Absent
/// fields leave the caller's descriptor untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AllocationResponse {
    name: Option<String>,
    description: Option<String>,
    components: Option<Vec<Component>>,
    policies: Option<Vec<Policy>>,
    manifests: Option<Vec<Value>>,
}

impl AllocationResponse {
    fn merge_into(self, descriptor: &mut AppDescriptor) {
        if let Some(name) = self.name {
            descriptor.name = name;
        }
        if let Some(description) = self.description {
            descriptor.description = description;
        }
        if let Some(components) = self.components {
            descriptor.components = components;
        }
        if let Some(policies) = self.policies {
            descriptor.policies = policies;
        }
        if let Some(manifests) = self.manifests {
            descriptor.manifests = manifests;
        }
    }
}

#[derive(Clone)]
pub struct Allocator {
    client: Arc<dyn MatchmakingClient>,
}

impl Allocator {
    pub fn new(client: Arc<dyn MatchmakingClient>) -> Self {
        Self { client }
    }

    /// Build a request from `options`, send it, and fold the response
    /// into `descriptor`.
    pub async fn allocate(
        &self,
        descriptor: &mut AppDescriptor,
        options: &[AllocationOption<'_>],
    ) -> AllocatorResult<()> {
        let request = AllocationRequest::build(options)?;
        let body = self.client.matchmake(request).await?;
        let response: AllocationResponse =
            serde_json::from_slice(&body).map_err(|e| AllocatorError::Decode(e.to_string()))?;
        response.merge_into(descriptor);
        debug!(app = %descriptor.name, components = descriptor.components.len(), "allocation applied");
        Ok(())
    }

    /// Normalize a component's placement payload onto `job`.
    pub fn assign_targets(&self, job: &mut Job, payload: &serde_json::Value) -> AllocatorResult<()> {
        targets::assign_targets(job, payload)
    }
}
