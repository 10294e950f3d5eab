//! Per-component manifest extraction.

use serde_yaml::Value;
use tracing::{Span, debug, warn};

use jobgrid_state::Content;

use crate::descriptor::Component;
use crate::error::{ManifestError, ManifestResult};
use crate::schema;

pub struct ManifestProcessor {
    log: Span,
}

impl ManifestProcessor {
    pub fn new(log: Span) -> Self {
        Self { log }
    }

    /// Select the documents `component` references and re-serialize them.
    ///
    /// Every document must carry a string `metadata.name`; one that does
    /// not fails the whole call. A referenced document that fails schema
    /// validation is logged and left out, so the component may end up
    /// with fewer contents than references (or none).
    pub fn process_manifests(
        &self,
        component: &Component,
        manifests: &[Value],
    ) -> ManifestResult<Vec<Content>> {
        let mut contents = Vec::new();
        for (index, document) in manifests.iter().enumerate() {
            let name = manifest_name(document, index)?;
            if !component.manifests.iter().any(|m| m.name == name) {
                continue;
            }

            let yaml = serde_yaml::to_string(document).map_err(|e| ManifestError::Serialize {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

            match schema::validate(&yaml) {
                Ok(kind) => {
                    debug!(parent: &self.log, component = %component.name, manifest = %name, %kind, "manifest accepted");
                    contents.push(Content {
                        name: name.to_string(),
                        yaml,
                    });
                }
                Err(e) => {
                    warn!(parent: &self.log, component = %component.name, manifest = %name, error = %e, "manifest failed validation, skipping");
                }
            }
        }
        Ok(contents)
    }
}

fn manifest_name(document: &Value, index: usize) -> ManifestResult<&str> {
    let metadata = document
        .get("metadata")
        .filter(|m| m.is_mapping())
        .ok_or(ManifestError::MissingMetadata { index })?;
    metadata
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ManifestError::InvalidName { index })
}
