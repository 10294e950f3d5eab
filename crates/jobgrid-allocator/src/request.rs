//! Allocation request construction.

use std::collections::HashSet;

use serde_yaml::Value;

use jobgrid_manifest::{AppDescriptor, Component, ManifestRef};
use jobgrid_state::JobGroup;

use crate::error::{AllocatorError, AllocatorResult};

/// A body or header strategy for one matchmaking request.
///
/// Options apply in order; when more than one body option is given the
/// last wins.
#[derive(Debug, Clone, Copy)]
pub enum AllocationOption<'a> {
    /// Send the descriptor exactly as the client uploaded it.
    RawBody(&'a [u8]),
    /// Rebuild a descriptor from a persisted group's instructions.
    FromJobGroup(&'a JobGroup),
    /// Forward the caller's `Authorization` header value.
    Authorization(&'a str),
}

/// What goes over the wire to the matchmaker.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub authorization: Option<String>,
}

impl AllocationRequest {
    pub const YAML: &'static str = "application/x-yaml";

    pub fn build(options: &[AllocationOption<'_>]) -> AllocatorResult<Self> {
        let mut body = None;
        let mut authorization = None;
        for option in options {
            match option {
                AllocationOption::RawBody(raw) => body = Some(raw.to_vec()),
                AllocationOption::FromJobGroup(group) => {
                    body = Some(reconstruct_descriptor(group)?.into_bytes())
                }
                AllocationOption::Authorization(value) => {
                    authorization = Some(value.to_string())
                }
            }
        }
        let body = body.ok_or_else(|| {
            AllocatorError::InvalidRequest("no descriptor body option supplied".to_string())
        })?;
        Ok(Self {
            body,
            content_type: Self::YAML,
            authorization,
        })
    }
}

/// Rebuild the descriptor a group was created from, as YAML.
///
/// Each job contributes one component (its instruction) whose manifest
/// references are the names of its contents; the contents themselves
/// become the inline manifest list, de-duplicated by name.
pub fn reconstruct_descriptor(group: &JobGroup) -> AllocatorResult<String> {
    let mut descriptor = AppDescriptor {
        name: group.app_name.clone(),
        description: group.app_description.clone(),
        ..AppDescriptor::default()
    };

    let mut seen = HashSet::new();
    for job in &group.jobs {
        let Some(instruction) = &job.instruction else {
            continue;
        };
        descriptor.components.push(Component {
            name: instruction.component_name.clone(),
            component_type: instruction.component_type.clone(),
            requirement: instruction.requirement.clone(),
            policies: instruction.policies.clone(),
            manifests: instruction
                .contents
                .iter()
                .map(|c| ManifestRef {
                    name: c.name.clone(),
                })
                .collect(),
            targets: serde_json::Value::Null,
        });
        for content in &instruction.contents {
            if !seen.insert(content.name.clone()) {
                continue;
            }
            let manifest: Value = serde_yaml::from_str(&content.yaml).map_err(|e| {
                AllocatorError::InvalidRequest(format!(
                    "stored manifest {} is not valid YAML: {e}",
                    content.name
                ))
            })?;
            descriptor.manifests.push(manifest);
        }
    }

    if descriptor.components.is_empty() {
        return Err(AllocatorError::InvalidRequest(format!(
            "job group {} has no instructions to allocate",
            group.id
        )));
    }
    descriptor
        .to_yaml()
        .map_err(|e| AllocatorError::InvalidRequest(e.to_string()))
}
