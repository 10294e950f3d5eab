//! Domain types for the jobgrid state store.
//!
//! A [`JobGroup`] owns an ordered list of [`Job`]s, one per application
//! component. A job carries the desired state ([`Instruction`]) and, once
//! deployed, the observed state ([`Resource`]) reported back by a driver.
//!
//! # Ownership
//!
//! `Job::owner_id` is `None` while no driver holds the job. On the wire
//! an unowned job serializes as `"owner_id": ""` and an empty string
//! deserializes back to `None`, so drivers that speak the string form keep
//! working. Every transition into [`JobState::Created`] clears the owner.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use jobgrid_core::epoch_secs;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub type JobGroupId = String;
pub type JobId = String;
pub type ResourceId = String;
pub type RemediationId = String;
/// Identity a driver uses when claiming jobs.
pub type OwnerId = String;

/// Fresh globally-unique identity.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ── Enumerations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Created,
    Progressing,
    Finished,
    Degraded,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobType {
    #[default]
    CreateDeployment,
    DeleteDeployment,
    UpdateDeployment,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Corrective action requested by the policy manager. Also used as a
/// job's sub-type once the job has been re-armed for that action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemediationType {
    ScaleUp,
    ScaleDown,
    ScaleOut,
    ScaleIn,
    Patch,
    #[serde(alias = "reallocation")]
    Reallocate,
    Replace,
    Secure,
}

impl RemediationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleUp => "scale-up",
            Self::ScaleDown => "scale-down",
            Self::ScaleOut => "scale-out",
            Self::ScaleIn => "scale-in",
            Self::Patch => "patch",
            Self::Reallocate => "reallocate",
            Self::Replace => "replace",
            Self::Secure => "secure",
        }
    }
}

impl fmt::Display for RemediationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemediationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scale-up" => Ok(Self::ScaleUp),
            "scale-down" => Ok(Self::ScaleDown),
            "scale-out" => Ok(Self::ScaleOut),
            "scale-in" => Ok(Self::ScaleIn),
            "patch" => Ok(Self::Patch),
            "reallocate" | "reallocation" => Ok(Self::Reallocate),
            "replace" => Ok(Self::Replace),
            "secure" => Ok(Self::Secure),
            other => Err(format!("unknown remediation type: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemediationStatus {
    #[default]
    Pending,
    Failed,
    Remediated,
}

/// Execution backend family a job is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orchestrator {
    Ocm,
    Nuvla,
    #[default]
    #[serde(alias = "")]
    None,
}

impl Orchestrator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocm => "ocm",
            Self::Nuvla => "nuvla",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orchestrator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ocm" => Ok(Self::Ocm),
            "nuvla" => Ok(Self::Nuvla),
            "none" | "" => Ok(Self::None),
            other => Err(format!("unknown orchestrator: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

// ── Job group ──────────────────────────────────────────────────────

/// The set of jobs materialized from one application descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobGroup {
    pub id: JobGroupId,
    pub app_name: String,
    pub app_description: String,
    pub jobs: Vec<Job>,
    /// Unix timestamp (seconds) when the group was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last group-level operation.
    pub updated_at: u64,
}

impl JobGroup {
    pub fn new(app_name: impl Into<String>, app_description: impl Into<String>) -> Self {
        let now = epoch_secs();
        Self {
            id: new_id(),
            app_name: app_name.into(),
            app_description: app_description.into(),
            jobs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a job, binding it to this group.
    pub fn push_job(&mut self, mut job: Job) {
        job.job_group_id = self.id.clone();
        self.jobs.push(job);
    }

    /// Why the group cannot be deleted yet, if anything blocks it.
    ///
    /// Deletion is allowed only once every job is an undeploy request that
    /// has either finished or never started.
    pub fn deletion_blocker(&self) -> Option<String> {
        self.jobs.iter().find_map(|job| {
            if job.job_type != JobType::DeleteDeployment {
                Some(format!(
                    "job {} has type {}, expected {}",
                    job.id,
                    job.job_type,
                    JobType::DeleteDeployment
                ))
            } else if !matches!(job.state, JobState::Finished | JobState::Created) {
                Some(format!(
                    "job {} is {}, expected Finished or Created",
                    job.id, job.state
                ))
            } else {
                None
            }
        })
    }
}

// ── Job ────────────────────────────────────────────────────────────

/// One component's deployment unit, claimed and executed by a driver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: JobId,
    pub job_group_id: JobGroupId,
    #[serde(with = "owner_id")]
    pub owner_id: Option<OwnerId>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<RemediationType>,
    pub state: JobState,
    pub orchestrator: Orchestrator,
    pub namespace: String,
    pub target: Option<Target>,
    pub instruction: Option<Instruction>,
    pub resource: Option<Resource>,
    /// Unix timestamp (seconds) when the job was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last state change. Drives lease expiry.
    pub updated_at: u64,
}

impl Job {
    /// A new unowned `Created`/`CreateDeployment` job.
    pub fn new(
        job_group_id: impl Into<String>,
        namespace: impl Into<String>,
        instruction: Instruction,
    ) -> Self {
        let now = epoch_secs();
        Self {
            id: new_id(),
            job_group_id: job_group_id.into(),
            owner_id: None,
            job_type: JobType::CreateDeployment,
            sub_type: None,
            state: JobState::Created,
            orchestrator: Orchestrator::Ocm,
            namespace: namespace.into(),
            target: None,
            instruction: Some(instruction),
            resource: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn is_owned(&self) -> bool {
        self.owner_id.is_some()
    }

    pub fn component_name(&self) -> Option<&str> {
        self.instruction.as_ref().map(|i| i.component_name.as_str())
    }

    /// `Created` jobs are unowned and `Progressing` jobs are owned.
    /// `Finished` and `Degraded` jobs may be either.
    pub fn ownership_consistent(&self) -> bool {
        match self.state {
            JobState::Created => self.owner_id.is_none(),
            JobState::Progressing => self.owner_id.is_some(),
            JobState::Finished | JobState::Degraded => true,
        }
    }

    /// Hand the job to `owner`. Only the store calls this, inside the
    /// conditional claim write.
    pub fn mark_claimed(&mut self, owner: &str, now: u64) {
        self.state = JobState::Progressing;
        self.owner_id = Some(owner.to_string());
        self.updated_at = now;
    }

    /// Put the job back in the executable pool with a new intent.
    pub fn rearm(&mut self, job_type: JobType, sub_type: Option<RemediationType>, now: u64) {
        self.state = JobState::Created;
        self.owner_id = None;
        self.job_type = job_type;
        self.sub_type = sub_type;
        self.updated_at = now;
    }

    pub fn mark_finished(&mut self, now: u64) {
        self.state = JobState::Finished;
        self.updated_at = now;
    }

    pub fn mark_degraded(&mut self, now: u64) {
        self.state = JobState::Degraded;
        self.updated_at = now;
    }

    /// Set the placement decision. A target without an orchestrator
    /// leaves the job's current backend unchanged.
    pub fn set_target(&mut self, target: Target) {
        if target.orchestrator != Orchestrator::None {
            self.orchestrator = target.orchestrator;
        }
        self.target = Some(target);
    }
}

/// Serde adapter mapping `None` to and from the empty string.
mod owner_id {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(owner: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(owner.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

// ── Instruction ────────────────────────────────────────────────────

/// Validated desired state for one component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instruction {
    pub component_name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub requirement: Requirement,
    pub policies: Vec<Policy>,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirement {
    #[serde(deserialize_with = "scalar_string")]
    pub cpu: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub memory: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub device: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub architecture: Option<String>,
}

/// Accept `cpu: 2` as well as `cpu: "2"`.
fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// One named manifest document, re-serialized as YAML.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Content {
    pub name: String,
    pub yaml: String,
}

// ── Placement ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    #[serde(alias = "clustername")]
    pub cluster_name: String,
    #[serde(alias = "nodename")]
    pub node_name: String,
    pub orchestrator: Orchestrator,
}

// ── Observed state ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    #[serde(alias = "resource_uuid")]
    pub id: ResourceId,
    pub job_id: JobId,
    #[serde(rename = "resource_name", alias = "name")]
    pub name: String,
    pub conditions: Vec<Condition>,
    pub remediations: Vec<Remediation>,
}

impl Resource {
    pub fn new(job_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            job_id: job_id.into(),
            name: name.into(),
            conditions: Vec::new(),
            remediations: Vec::new(),
        }
    }
}

/// Kubernetes-style status condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default = "Utc::now")]
    pub last_transition_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            observed_generation: 0,
            last_transition_time: Utc::now(),
            reason: String::new(),
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    #[serde(default)]
    pub id: RemediationId,
    #[serde(rename = "remediationType")]
    pub remediation_type: RemediationType,
    #[serde(rename = "remediationStatus", default)]
    pub status: RemediationStatus,
    #[serde(
        rename = "remediationTarget",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<RemediationTarget>,
    #[serde(default)]
    pub resource_id: ResourceId,
    #[serde(default)]
    pub created_at: u64,
}

impl Remediation {
    /// A new `Pending` remediation against `resource_id`.
    pub fn pending(remediation_type: RemediationType, resource_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            remediation_type,
            status: RemediationStatus::Pending,
            target: None,
            resource_id: resource_id.into(),
            created_at: epoch_secs(),
        }
    }
}

/// Where a `secure` remediation applies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationTarget {
    pub container: String,
    pub pod_uid: String,
    pub pod: String,
    pub node: String,
    pub namespace: String,
    pub command: String,
}

// ── Policy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub name: String,
    pub component: String,
    #[serde(rename = "fromTemplate", skip_serializing_if = "Option::is_none")]
    pub from_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<PolicySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    pub variables: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySpec {
    pub expr: String,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(name: &str) -> Instruction {
        Instruction {
            component_name: name.to_string(),
            component_type: "service".to_string(),
            ..Instruction::default()
        }
    }

    #[test]
    fn new_job_is_created_and_unowned() {
        let job = Job::new("g1", "ns", instruction("web"));
        assert_eq!(job.state, JobState::Created);
        assert_eq!(job.job_type, JobType::CreateDeployment);
        assert!(job.owner().is_none());
        assert!(job.ownership_consistent());
        assert_eq!(job.component_name(), Some("web"));
    }

    #[test]
    fn constructors_assign_distinct_ids() {
        let a = Job::new("g1", "ns", instruction("a"));
        let b = Job::new("g1", "ns", instruction("a"));
        assert_ne!(a.id, b.id);
        assert_ne!(JobGroup::new("x", "").id, JobGroup::new("x", "").id);
    }

    #[test]
    fn claim_then_rearm_restores_unowned_created() {
        let mut job = Job::new("g1", "ns", instruction("web"));
        job.mark_claimed("driver-a", 10);
        assert_eq!(job.state, JobState::Progressing);
        assert_eq!(job.owner(), Some("driver-a"));
        assert!(job.ownership_consistent());

        job.mark_finished(20);
        assert!(job.ownership_consistent());

        job.rearm(JobType::UpdateDeployment, Some(RemediationType::ScaleUp), 30);
        assert_eq!(job.state, JobState::Created);
        assert!(job.owner().is_none());
        assert_eq!(job.sub_type, Some(RemediationType::ScaleUp));
        assert!(job.ownership_consistent());
    }

    #[test]
    fn inconsistent_ownership_is_detected() {
        let mut job = Job::new("g1", "ns", instruction("web"));
        job.owner_id = Some("a".to_string());
        assert!(!job.ownership_consistent());

        job.state = JobState::Progressing;
        job.owner_id = None;
        assert!(!job.ownership_consistent());
    }

    #[test]
    fn owner_serializes_as_empty_string_when_unowned() {
        let job = Job::new("g1", "ns", instruction("web"));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["owner_id"], "");
        assert_eq!(json["type"], "CreateDeployment");
        assert_eq!(json["state"], "Created");
        assert_eq!(json["orchestrator"], "ocm");
    }

    #[test]
    fn empty_owner_string_deserializes_to_none() {
        let job: Job = serde_json::from_str(r#"{"id":"j1","owner_id":""}"#).unwrap();
        assert!(job.owner_id.is_none());

        let job: Job = serde_json::from_str(r#"{"id":"j1","owner_id":null}"#).unwrap();
        assert!(job.owner_id.is_none());

        let job: Job = serde_json::from_str(r#"{"id":"j1"}"#).unwrap();
        assert!(job.owner_id.is_none());

        let job: Job = serde_json::from_str(r#"{"id":"j1","owner_id":"driver-b"}"#).unwrap();
        assert_eq!(job.owner(), Some("driver-b"));
    }

    #[test]
    fn deletion_blocked_until_all_jobs_undeployed() {
        let mut group = JobGroup::new("app", "");
        group.push_job(Job::new("", "ns", instruction("a")));
        group.push_job(Job::new("", "ns", instruction("b")));
        assert!(group.jobs.iter().all(|j| j.job_group_id == group.id));

        let reason = group.deletion_blocker().unwrap();
        assert!(reason.contains("CreateDeployment"));

        for job in &mut group.jobs {
            job.rearm(JobType::DeleteDeployment, None, 1);
        }
        assert!(group.deletion_blocker().is_none());

        group.jobs[0].state = JobState::Progressing;
        group.jobs[0].owner_id = Some("d".to_string());
        assert!(group.deletion_blocker().unwrap().contains("Progressing"));

        group.jobs[0].mark_finished(2);
        assert!(group.deletion_blocker().is_none());
    }

    #[test]
    fn remediation_type_vocabulary() {
        assert_eq!("scale-up".parse::<RemediationType>().unwrap(), RemediationType::ScaleUp);
        assert_eq!(
            "reallocation".parse::<RemediationType>().unwrap(),
            RemediationType::Reallocate
        );
        assert!("reboot".parse::<RemediationType>().is_err());

        let parsed: RemediationType = serde_json::from_str(r#""reallocation""#).unwrap();
        assert_eq!(parsed, RemediationType::Reallocate);
        assert_eq!(serde_json::to_string(&RemediationType::ScaleIn).unwrap(), r#""scale-in""#);
    }

    #[test]
    fn orchestrator_parsing() {
        assert_eq!("OCM".parse::<Orchestrator>().unwrap(), Orchestrator::Ocm);
        assert_eq!("nuvla".parse::<Orchestrator>().unwrap(), Orchestrator::Nuvla);
        assert!("kubectl".parse::<Orchestrator>().is_err());
        let parsed: Orchestrator = serde_json::from_str(r#""""#).unwrap();
        assert_eq!(parsed, Orchestrator::None);
    }

    #[test]
    fn target_accepts_matchmaker_field_names() {
        let target: Target =
            serde_json::from_str(r#"{"clustername":"c1","nodename":"n1","orchestrator":"nuvla"}"#)
                .unwrap();
        assert_eq!(target.cluster_name, "c1");
        assert_eq!(target.node_name, "n1");

        let mut job = Job::new("g", "ns", instruction("a"));
        job.set_target(target);
        assert_eq!(job.orchestrator, Orchestrator::Nuvla);

        job.set_target(Target {
            cluster_name: "c2".to_string(),
            ..Target::default()
        });
        assert_eq!(job.orchestrator, Orchestrator::Nuvla);
    }

    #[test]
    fn requirement_accepts_numeric_scalars() {
        let req: Requirement =
            serde_json::from_str(r#"{"cpu": 2, "memory": "4Gi", "architecture": null}"#).unwrap();
        assert_eq!(req.cpu.as_deref(), Some("2"));
        assert_eq!(req.memory.as_deref(), Some("4Gi"));
        assert!(req.architecture.is_none());
    }

    #[test]
    fn resource_accepts_legacy_field_names() {
        let resource: Resource = serde_json::from_str(
            r#"{"resource_uuid":"r1","resource_name":"web","conditions":[
                {"type":"Available","status":"True","lastTransitionTime":"2024-01-01T00:00:00Z"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(resource.id, "r1");
        assert_eq!(resource.name, "web");
        assert_eq!(resource.conditions[0].status, ConditionStatus::True);
    }
}
