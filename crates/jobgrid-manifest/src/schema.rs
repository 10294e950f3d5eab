//! Closed vocabulary of manifest kinds the job manager accepts.
//!
//! Validation is structural: the document must name a known
//! `(apiVersion, kind)` pair and decode into that kind's shape. Fields the
//! shape does not declare are ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("not a decodable object: {0}")]
    Decode(String),

    #[error("unknown object kind {kind} in {api_version}")]
    UnknownKind { api_version: String, kind: String },

    #[error("invalid {kind}: {reason}")]
    Invalid { kind: ObjectKind, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    Pod,
    Service,
    ConfigMap,
    Secret,
    Namespace,
    PersistentVolumeClaim,
    ServiceAccount,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 11] = [
        Self::Deployment,
        Self::StatefulSet,
        Self::DaemonSet,
        Self::ReplicaSet,
        Self::Pod,
        Self::Service,
        Self::ConfigMap,
        Self::Secret,
        Self::Namespace,
        Self::PersistentVolumeClaim,
        Self::ServiceAccount,
    ];

    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Deployment | Self::StatefulSet | Self::DaemonSet | Self::ReplicaSet => "apps/v1",
            _ => "v1",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::ReplicaSet => "ReplicaSet",
            Self::Pod => "Pod",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Namespace => "Namespace",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::ServiceAccount => "ServiceAccount",
        }
    }

    pub fn lookup(api_version: &str, kind: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.api_version() == api_version && k.kind() == kind)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind())
    }
}

/// Validate one YAML (or JSON) document and report its kind.
pub fn validate(document: &str) -> Result<ObjectKind, SchemaError> {
    let meta: TypeMeta =
        serde_yaml::from_str(document).map_err(|e| SchemaError::Decode(e.to_string()))?;
    let kind = ObjectKind::lookup(&meta.api_version, &meta.kind).ok_or_else(|| {
        SchemaError::UnknownKind {
            api_version: meta.api_version.clone(),
            kind: meta.kind.clone(),
        }
    })?;

    let checked = match kind {
        ObjectKind::Deployment
        | ObjectKind::StatefulSet
        | ObjectKind::DaemonSet
        | ObjectKind::ReplicaSet => decode::<Workload>(document, kind)?.check(),
        ObjectKind::Pod => decode::<PodObject>(document, kind)?.check(),
        ObjectKind::Service => decode::<ServiceObject>(document, kind)?.check(),
        ObjectKind::ConfigMap => decode::<ConfigMapObject>(document, kind)?.check(),
        ObjectKind::Secret => decode::<SecretObject>(document, kind)?.check(),
        ObjectKind::Namespace | ObjectKind::PersistentVolumeClaim | ObjectKind::ServiceAccount => {
            decode::<BareObject>(document, kind)?.metadata.check()
        }
    };
    checked.map_err(|reason| SchemaError::Invalid { kind, reason })?;
    Ok(kind)
}

fn decode<T: DeserializeOwned>(document: &str, kind: ObjectKind) -> Result<T, SchemaError> {
    serde_yaml::from_str(document).map_err(|e| SchemaError::Invalid {
        kind,
        reason: e.to_string(),
    })
}

// ── Shapes ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    api_version: String,
    kind: String,
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
}

impl ObjectMeta {
    fn check(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > 253 {
            return Err(format!("metadata.name {:?} must be 1-253 characters", self.name));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct BareObject {
    metadata: ObjectMeta,
}

#[derive(Deserialize)]
struct Workload {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<WorkloadSpec>,
}

#[derive(Deserialize)]
struct WorkloadSpec {
    #[serde(default)]
    replicas: Option<i32>,
    #[serde(default)]
    template: Option<PodTemplate>,
}

#[derive(Deserialize)]
struct PodTemplate {
    spec: PodSpec,
}

impl Workload {
    fn check(&self) -> Result<(), String> {
        self.metadata.check()?;
        let Some(spec) = &self.spec else {
            return Ok(());
        };
        if let Some(replicas) = spec.replicas.filter(|r| *r < 0) {
            return Err(format!("spec.replicas must not be negative, got {replicas}"));
        }
        match &spec.template {
            Some(template) => template.spec.check(),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    containers: Vec<Container>,
    #[serde(default)]
    init_containers: Vec<Container>,
}

impl PodSpec {
    fn check(&self) -> Result<(), String> {
        if self.containers.is_empty() {
            return Err("pod spec declares no containers".to_string());
        }
        self.containers
            .iter()
            .chain(&self.init_containers)
            .try_for_each(Container::check)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    name: String,
    #[serde(default)]
    ports: Vec<ContainerPort>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPort {
    container_port: i64,
}

impl Container {
    fn check(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("container without a name".to_string());
        }
        for port in &self.ports {
            check_port(&format!("container {} port", self.name), port.container_port)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct PodObject {
    metadata: ObjectMeta,
    spec: PodSpec,
}

impl PodObject {
    fn check(&self) -> Result<(), String> {
        self.metadata.check()?;
        self.spec.check()
    }
}

#[derive(Deserialize)]
struct ServiceObject {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<ServiceSpec>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceSpec {
    #[serde(rename = "type", default)]
    service_type: Option<String>,
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServicePort {
    port: i64,
    #[serde(default)]
    target_port: Option<IntOrString>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

const SERVICE_TYPES: [&str; 4] = ["ClusterIP", "NodePort", "LoadBalancer", "ExternalName"];

impl ServiceObject {
    fn check(&self) -> Result<(), String> {
        self.metadata.check()?;
        let Some(spec) = &self.spec else {
            return Ok(());
        };
        if let Some(t) = spec.service_type.as_deref().filter(|t| !SERVICE_TYPES.contains(t)) {
            return Err(format!("unsupported service type {t:?}"));
        }
        for port in &spec.ports {
            check_port("service port", port.port)?;
            match &port.target_port {
                Some(IntOrString::Int(p)) => check_port("service targetPort", *p)?,
                Some(IntOrString::Str(name)) if name.is_empty() => {
                    return Err("service targetPort name is empty".to_string());
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigMapObject {
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl ConfigMapObject {
    fn check(&self) -> Result<(), String> {
        self.metadata.check()?;
        match self.data.keys().find(|k| k.is_empty()) {
            Some(_) => Err("configmap data has an empty key".to_string()),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretObject {
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default)]
    string_data: BTreeMap<String, String>,
}

impl SecretObject {
    fn check(&self) -> Result<(), String> {
        self.metadata.check()?;
        match self.data.keys().chain(self.string_data.keys()).find(|k| k.is_empty()) {
            Some(_) => Err("secret data has an empty key".to_string()),
            None => Ok(()),
        }
    }
}

fn check_port(what: &str, port: i64) -> Result<(), String> {
    if (1..=65535).contains(&port) {
        Ok(())
    } else {
        Err(format!("{what} {port} out of range 1-65535"))
    }
}
