//! Application descriptor model and multi-document parsing.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use jobgrid_state::{Policy, Requirement};

use crate::error::{ManifestError, ManifestResult};

/// The header document of a descriptor, plus the manifests that follow it.
///
/// This is also the shape exchanged with the matchmaking service: the
/// allocation response is decoded into the same struct, with each
/// component's `targets` filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub description: String,
    pub components: Vec<Component>,
    pub policies: Vec<Policy>,
    pub manifests: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(rename = "requirements", alias = "requirement")]
    pub requirement: Requirement,
    pub policies: Vec<Policy>,
    pub manifests: Vec<ManifestRef>,
    /// Placement payload from the matchmaker. Its shape varies, so it is
    /// kept raw and decoded by the allocator.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub targets: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRef {
    pub name: String,
}

impl AppDescriptor {
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn to_yaml(&self) -> ManifestResult<String> {
        serde_yaml::to_string(self).map_err(|e| ManifestError::Serialize {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// Parse a raw descriptor body.
///
/// The first non-empty document is the header; every later document is
/// appended to `manifests` after any the header declares inline.
pub fn parse_descriptor(body: &[u8]) -> ManifestResult<AppDescriptor> {
    let text = std::str::from_utf8(body).map_err(|e| ManifestError::Encoding(e.to_string()))?;

    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| ManifestError::Parse(e.to_string()))?;
        if !value.is_null() {
            documents.push(value);
        }
    }

    let mut documents = documents.into_iter();
    let header = documents.next().ok_or(ManifestError::EmptyDescriptor)?;
    let mut descriptor: AppDescriptor =
        serde_yaml::from_value(header).map_err(|e| ManifestError::Parse(e.to_string()))?;
    descriptor.manifests.extend(documents);

    if descriptor.components.is_empty() {
        return Err(ManifestError::NoComponents);
    }
    if let Some(index) = descriptor.components.iter().position(|c| c.name.trim().is_empty()) {
        return Err(ManifestError::UnnamedComponent(index));
    }
    Ok(descriptor)
}
