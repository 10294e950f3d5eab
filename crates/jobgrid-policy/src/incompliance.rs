//! Incompliance notification decoding.
//!
//! The policy manager sends far more than we need; only the remediation
//! type, the `k8s_*` labels, and the subject are read.

use serde::Deserialize;

use jobgrid_state::{Remediation, RemediationTarget, RemediationType};

use crate::error::{PolicyError, PolicyResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Incompliance {
    pub id: String,
    pub remediation: String,
    #[serde(rename = "extraLabels")]
    pub extra_labels: ExtraLabels,
    pub subject: Subject,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtraLabels {
    #[serde(rename = "k8s_container_name")]
    pub container: String,
    #[serde(rename = "k8s_pod_uid")]
    pub pod_uid: String,
    #[serde(rename = "k8s_pod_name")]
    pub pod: String,
    #[serde(rename = "k8s_node_name")]
    pub node: String,
    #[serde(rename = "k8s_namespace_name")]
    pub namespace: String,
    pub command: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Subject {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub manifest: String,
}

impl Incompliance {
    pub fn parse(body: &[u8]) -> PolicyResult<Self> {
        serde_json::from_slice(body).map_err(|e| PolicyError::InvalidNotification(e.to_string()))
    }

    /// The resource the violation was observed on.
    pub fn resource_id(&self) -> PolicyResult<&str> {
        [&self.subject.resource_id, &self.subject.manifest]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .ok_or(PolicyError::MissingSubject)
    }

    pub fn remediation_type(&self) -> PolicyResult<RemediationType> {
        self.remediation
            .parse()
            .map_err(|_| PolicyError::UnknownRemediation(self.remediation.clone()))
    }

    /// A pending remediation against the subject resource. A `secure`
    /// remediation also carries where to apply it.
    pub fn to_remediation(&self) -> PolicyResult<Remediation> {
        let remediation_type = self.remediation_type()?;
        let mut remediation = Remediation::pending(remediation_type, self.resource_id()?);
        if remediation_type == RemediationType::Secure {
            let labels = &self.extra_labels;
            remediation.target = Some(RemediationTarget {
                container: labels.container.clone(),
                pod_uid: labels.pod_uid.clone(),
                pod: labels.pod.clone(),
                node: labels.node.clone(),
                namespace: labels.namespace.clone(),
                command: labels.command.clone(),
            });
        }
        Ok(remediation)
    }
}
