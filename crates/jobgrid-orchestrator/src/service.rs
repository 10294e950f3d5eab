//! JobGroupService — the descriptor-to-jobs pipeline and group transitions.

use std::sync::Arc;

use tracing::{Span, debug, info, warn};

use jobgrid_allocator::{AllocationOption, Allocator};
use jobgrid_core::epoch_secs;
use jobgrid_manifest::{AppDescriptor, ManifestProcessor, parse_descriptor};
use jobgrid_policy::{Notification, PolicyManagerClient};
use jobgrid_scheduler::JobService;
use jobgrid_state::{
    Instruction, Job, JobGroup, JobGroupRepository, JobState, JobType, Orchestrator, RemediationType,
    new_id,
};

use crate::error::{OrchestratorError, OrchestratorResult};

pub struct JobGroupService {
    groups: Arc<dyn JobGroupRepository>,
    jobs: Arc<JobService>,
    allocator: Allocator,
    manifests: ManifestProcessor,
    notifier: Arc<dyn PolicyManagerClient>,
    log: Span,
}

impl JobGroupService {
    pub fn new(
        groups: Arc<dyn JobGroupRepository>,
        jobs: Arc<JobService>,
        allocator: Allocator,
        notifier: Arc<dyn PolicyManagerClient>,
        log: Span,
    ) -> Self {
        Self {
            groups,
            jobs,
            allocator,
            manifests: ManifestProcessor::new(log.clone()),
            notifier,
            log,
        }
    }

    pub fn find_job_group(&self, id: &str) -> OrchestratorResult<JobGroup> {
        if id.trim().is_empty() {
            return Err(OrchestratorError::Validation("job group id is required".to_string()));
        }
        self.groups
            .find_job_group(id)?
            .ok_or_else(|| OrchestratorError::GroupNotFound(id.to_string()))
    }

    pub fn list_job_groups(&self) -> OrchestratorResult<Vec<JobGroup>> {
        Ok(self.groups.list_job_groups()?)
    }

    /// Build and persist a job group from a raw descriptor.
    ///
    /// The descriptor goes to the matchmaker verbatim. Each allocated
    /// component becomes one `Created`/`CreateDeployment` job carrying the
    /// manifests it references. The policy manager is told about the new
    /// group afterwards; a failed notification is logged, not returned.
    pub async fn create_job_group(
        &self,
        body: &[u8],
        authorization: Option<&str>,
    ) -> OrchestratorResult<JobGroup> {
        let mut descriptor = parse_descriptor(body)?;

        let mut options = vec![AllocationOption::RawBody(body)];
        if let Some(token) = authorization {
            options.push(AllocationOption::Authorization(token));
        }
        self.allocator.allocate(&mut descriptor, &options).await?;
        if descriptor.components.is_empty() {
            warn!(parent: &self.log, app = %descriptor.name, "allocation returned no components");
        }

        let mut group = JobGroup::new(app_name(&descriptor.name), descriptor.description.clone());
        let namespace = if descriptor.namespace.is_empty() {
            group.app_name.clone()
        } else {
            descriptor.namespace.clone()
        };

        for component in &descriptor.components {
            let contents = self
                .manifests
                .process_manifests(component, &descriptor.manifests)?;
            let instruction = Instruction {
                component_name: component.name.clone(),
                component_type: component.component_type.clone(),
                requirement: component.requirement.clone(),
                policies: component.policies.clone(),
                contents,
            };
            let mut job = Job::new(&group.id, &namespace, instruction);
            self.allocator.assign_targets(&mut job, &component.targets)?;
            debug!(
                parent: &self.log,
                job_id = %job.id,
                component = %component.name,
                contents = job.instruction.as_ref().map_or(0, |i| i.contents.len()),
                "job built"
            );
            group.push_job(job);
        }

        self.groups.save_job_group(&group)?;
        info!(parent: &self.log, group_id = %group.id, app = %group.app_name, jobs = group.jobs.len(), "job group created");

        self.notify_policy_manager(&descriptor, &group, authorization)
            .await;
        Ok(group)
    }

    async fn notify_policy_manager(
        &self,
        descriptor: &AppDescriptor,
        group: &JobGroup,
        authorization: Option<&str>,
    ) {
        let header = AppDescriptor {
            manifests: Vec::new(),
            ..descriptor.clone()
        };
        let yaml = match header.to_yaml() {
            Ok(yaml) => yaml,
            Err(e) => {
                warn!(parent: &self.log, group_id = %group.id, error = %e, "cannot encode descriptor for policy manager");
                return;
            }
        };
        let notification = Notification::registration(group, &yaml);
        if let Err(e) = self.notifier.notify(&notification, authorization).await {
            warn!(parent: &self.log, group_id = %group.id, error = %e, "policy manager notification failed");
        }
    }

    /// Re-allocate a persisted group and make every job executable again.
    pub async fn start_job_group(
        &self,
        id: &str,
        authorization: Option<&str>,
    ) -> OrchestratorResult<JobGroup> {
        let mut group = self.find_job_group(id)?;
        let allocation = self.allocate_group(&group, authorization).await?;

        let now = epoch_secs();
        for job in &mut group.jobs {
            if let Some(component) = job
                .component_name()
                .and_then(|name| allocation.component(name))
            {
                self.allocator.assign_targets(job, &component.targets)?;
            }
            job.rearm(JobType::CreateDeployment, None, now);
        }
        group.updated_at = now;

        self.groups.update_job_group(&group)?;
        info!(parent: &self.log, group_id = %id, jobs = group.jobs.len(), "job group started");
        Ok(group)
    }

    /// Request undeployment of every job in the group.
    ///
    /// Every job must be `Finished` with a resource; a group that is
    /// already fully undeploy-requested is returned unchanged.
    pub fn stop_job_group(&self, id: &str) -> OrchestratorResult<JobGroup> {
        let mut group = self.find_job_group(id)?;
        if group.jobs.is_empty() {
            return Err(OrchestratorError::InvalidTransition {
                id: id.to_string(),
                action: "stopped",
                reason: "job group has no jobs".to_string(),
            });
        }

        if group.jobs.iter().all(undeploy_requested) {
            debug!(parent: &self.log, group_id = %id, "job group already stopped");
            return Ok(group);
        }

        for job in group.jobs.iter().filter(|j| !undeploy_requested(j)) {
            let reason = if job.state != JobState::Finished {
                format!("job {} is {}, expected Finished", job.id, job.state)
            } else if job.resource.is_none() {
                format!("job {} has no resource", job.id)
            } else {
                continue;
            };
            return Err(OrchestratorError::InvalidTransition {
                id: id.to_string(),
                action: "stopped",
                reason,
            });
        }

        let now = epoch_secs();
        for job in group.jobs.iter_mut().filter(|j| !undeploy_requested(j)) {
            job.rearm(JobType::DeleteDeployment, None, now);
        }
        group.updated_at = now;

        self.groups.update_job_group(&group)?;
        info!(parent: &self.log, group_id = %id, "job group stopped");
        Ok(group)
    }

    /// Merge an edited group (JSON) into the stored one and re-arm every
    /// job. Jobs are matched by id; unmatched incoming jobs are ignored.
    pub fn replace_job_group(&self, body: &[u8]) -> OrchestratorResult<JobGroup> {
        let update: JobGroup = serde_json::from_slice(body)
            .map_err(|e| OrchestratorError::Validation(format!("invalid job group: {e}")))?;
        let mut group = self.find_job_group(&update.id)?;

        if !update.app_name.is_empty() {
            group.app_name = update.app_name;
        }
        if !update.app_description.is_empty() {
            group.app_description = update.app_description;
        }

        let now = epoch_secs();
        for job in &mut group.jobs {
            if let Some(incoming) = update.jobs.iter().find(|j| j.id == job.id) {
                merge_job(job, incoming.clone());
            }
            // A re-armed job has no owner but may still hold a live resource.
            if job.is_owned() || job.resource.is_some() {
                job.rearm(JobType::UpdateDeployment, Some(RemediationType::Replace), now);
            } else {
                job.rearm(JobType::CreateDeployment, None, now);
            }
        }
        group.updated_at = now;

        self.groups.update_job_group(&group)?;
        info!(parent: &self.log, group_id = %group.id, "job group replaced");
        Ok(group)
    }

    /// Cascade-delete a group once every job has been undeployed.
    pub fn delete_job_group(&self, id: &str) -> OrchestratorResult<JobGroup> {
        let group = self.find_job_group(id)?;
        if let Some(reason) = group.deletion_blocker() {
            return Err(OrchestratorError::InvalidTransition {
                id: id.to_string(),
                action: "deleted",
                reason,
            });
        }
        self.groups.delete_job_group(id)?;
        info!(parent: &self.log, group_id = %id, "job group deleted");
        Ok(group)
    }

    /// Place one job again and make it executable.
    ///
    /// The whole group is re-allocated so the matchmaker sees the full
    /// application; only `job_id`'s target changes. The job must not be
    /// running or still hold a deployed resource.
    pub async fn reallocate_job(
        &self,
        job_id: &str,
        authorization: Option<&str>,
    ) -> OrchestratorResult<Job> {
        let mut job = self.jobs.find_job(job_id)?;
        let blocker = if job.state == JobState::Progressing {
            Some("job is Progressing".to_string())
        } else if job.resource.is_some() {
            Some("job still has a deployed resource, undeploy it first".to_string())
        } else {
            None
        };
        if let Some(reason) = blocker {
            return Err(OrchestratorError::InvalidTransition {
                id: job.job_group_id.clone(),
                action: "reallocated",
                reason: format!("job {job_id}: {reason}"),
            });
        }

        let group = self.find_job_group(&job.job_group_id)?;
        let allocation = self.allocate_group(&group, authorization).await?;
        let component = job
            .component_name()
            .and_then(|name| allocation.component(name))
            .ok_or_else(|| {
                OrchestratorError::Validation(format!(
                    "allocation has no component for job {job_id}"
                ))
            })?;
        self.allocator.assign_targets(&mut job, &component.targets)?;
        job.rearm(JobType::CreateDeployment, None, epoch_secs());

        self.jobs.update_job(&job)?;
        info!(
            parent: &self.log,
            job_id = %job_id,
            cluster = job.target.as_ref().map_or("", |t| t.cluster_name.as_str()),
            "job reallocated"
        );
        Ok(job)
    }

    /// Follow-up after a driver report. A finished reallocation teardown
    /// is immediately redeployed elsewhere.
    pub async fn after_report(
        &self,
        job: &Job,
        authorization: Option<&str>,
    ) -> OrchestratorResult<Option<Job>> {
        let teardown_done = job.state == JobState::Finished
            && job.job_type == JobType::DeleteDeployment
            && job.sub_type == Some(RemediationType::Reallocate);
        if !teardown_done {
            return Ok(None);
        }
        self.reallocate_job(&job.id, authorization).await.map(Some)
    }

    async fn allocate_group(
        &self,
        group: &JobGroup,
        authorization: Option<&str>,
    ) -> OrchestratorResult<AppDescriptor> {
        let mut options = vec![AllocationOption::FromJobGroup(group)];
        if let Some(token) = authorization {
            options.push(AllocationOption::Authorization(token));
        }
        let mut allocation = AppDescriptor::default();
        self.allocator.allocate(&mut allocation, &options).await?;
        Ok(allocation)
    }
}

/// `{name}-{uuid}`, or a bare uuid for an unnamed application.
fn app_name(name: &str) -> String {
    if name.is_empty() {
        new_id()
    } else {
        format!("{name}-{}", new_id())
    }
}

fn undeploy_requested(job: &Job) -> bool {
    job.job_type == JobType::DeleteDeployment
        && matches!(job.state, JobState::Created | JobState::Finished)
}

/// Copy the fields a client may edit from `incoming` onto `job`.
fn merge_job(job: &mut Job, incoming: Job) {
    if incoming.instruction.is_some() {
        job.instruction = incoming.instruction;
    }
    if let Some(target) = incoming.target {
        job.set_target(target);
    }
    if !incoming.namespace.is_empty() {
        job.namespace = incoming.namespace;
    }
    if incoming.orchestrator != Orchestrator::None {
        job.orchestrator = incoming.orchestrator;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use jobgrid_allocator::{AllocationRequest, AllocatorError, AllocatorResult, MatchmakingClient};
    use jobgrid_core::ErrorKind;
    use jobgrid_policy::{PolicyError, PolicyResult};
    use jobgrid_scheduler::LeaseConfig;
    use jobgrid_state::{ConditionStatus, JobRepository, Remediation, Resource, StateStore};

    /// Places every component on `cluster` and echoes the descriptor back.
    struct StubMatchmaker {
        cluster: Mutex<String>,
        requests: Mutex<Vec<AllocationRequest>>,
        fail: bool,
    }

    impl StubMatchmaker {
        fn new(cluster: &str) -> Arc<Self> {
            Arc::new(Self {
                cluster: Mutex::new(cluster.to_string()),
                requests: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                cluster: Mutex::new(String::new()),
                requests: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn move_to(&self, cluster: &str) {
            *self.cluster.lock().unwrap() = cluster.to_string();
        }
    }

    #[async_trait]
    impl MatchmakingClient for StubMatchmaker {
        async fn matchmake(&self, request: AllocationRequest) -> AllocatorResult<Vec<u8>> {
            if self.fail {
                return Err(AllocatorError::Matchmaking {
                    status: 503,
                    body: "no capacity".to_string(),
                });
            }
            let mut descriptor = parse_descriptor(&request.body).unwrap();
            let cluster = self.cluster.lock().unwrap().clone();
            for component in &mut descriptor.components {
                component.targets = serde_json::json!({
                    "cluster_name": cluster,
                    "node_name": format!("{}-node", component.name),
                    "orchestrator": "ocm",
                });
            }
            self.requests.lock().unwrap().push(request);
            Ok(serde_json::to_vec(&descriptor).unwrap())
        }
    }

    #[derive(Default)]
    struct RecordingPolicyManager {
        seen: Mutex<Vec<(Notification, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl PolicyManagerClient for RecordingPolicyManager {
        async fn notify(
            &self,
            notification: &Notification,
            authorization: Option<&str>,
        ) -> PolicyResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push((notification.clone(), authorization.map(str::to_string)));
            if self.fail {
                return Err(PolicyError::PolicyManager {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        store: StateStore,
        jobs: Arc<JobService>,
        matchmaker: Arc<StubMatchmaker>,
        policy: Arc<RecordingPolicyManager>,
        service: JobGroupService,
    }

    fn fixture_with(matchmaker: Arc<StubMatchmaker>, policy: RecordingPolicyManager) -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let jobs = Arc::new(JobService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            LeaseConfig::default(),
            Span::none(),
        ));
        let policy = Arc::new(policy);
        let service = JobGroupService::new(
            Arc::new(store.clone()),
            jobs.clone(),
            Allocator::new(matchmaker.clone()),
            policy.clone(),
            Span::none(),
        );
        Fixture {
            store,
            jobs,
            matchmaker,
            policy,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(StubMatchmaker::new("edge-1"), RecordingPolicyManager::default())
    }

    const DESCRIPTOR: &str = r#"
name: shop
namespace: retail
description: demo shop
components:
  - name: web
    type: service
    requirements: {cpu: 2, memory: 512Mi}
    manifests: [{name: web}]
  - name: db
    type: database
    manifests: [{name: db-config}]
---
apiVersion: apps/v1
kind: Deployment
metadata: {name: web}
spec:
  replicas: 2
  template:
    spec:
      containers: [{name: web, image: nginx}]
---
apiVersion: v1
kind: ConfigMap
metadata: {name: db-config}
data: {user: shop}
"#;

    /// Drive every job of a group to Finished with a resource.
    fn deploy_all(f: &Fixture, group: &JobGroup) {
        for job in &group.jobs {
            f.jobs.promote_job(&job.id, "driver-a").unwrap();
            let mut resource = Resource::default();
            resource.conditions.push(jobgrid_state::Condition::new(
                "Available",
                ConditionStatus::True,
            ));
            f.jobs.report_job_state(&job.id, Some(resource)).unwrap();
        }
    }

    fn undeploy_all(f: &Fixture, group_id: &str) {
        let group = f.service.stop_job_group(group_id).unwrap();
        for job in &group.jobs {
            f.jobs.promote_job(&job.id, "driver-a").unwrap();
            f.jobs.report_job_state(&job.id, None).unwrap();
        }
    }

    // ── Create ─────────────────────────────────────────────────

    #[tokio::test]
    async fn two_components_two_manifests_round_trip() {
        let f = fixture();
        let created = f
            .service
            .create_job_group(DESCRIPTOR.as_bytes(), Some("Bearer t"))
            .await
            .unwrap();

        let stored = f.service.find_job_group(&created.id).unwrap();
        assert!(stored.app_name.starts_with("shop-"));
        assert_eq!(stored.app_description, "demo shop");
        assert_eq!(stored.jobs.len(), 2);
        for (job, (component, manifest)) in stored.jobs.iter().zip([("web", "web"), ("db", "db-config")]) {
            let instruction = job.instruction.as_ref().unwrap();
            assert_eq!(instruction.component_name, component);
            assert_eq!(instruction.contents.len(), 1);
            assert_eq!(instruction.contents[0].name, manifest);
            assert_eq!(job.state, JobState::Created);
            assert_eq!(job.job_type, JobType::CreateDeployment);
            assert_eq!(job.namespace, "retail");
            assert_eq!(job.orchestrator, Orchestrator::Ocm);
            assert_eq!(job.target.as_ref().unwrap().cluster_name, "edge-1");
            assert!(job.owner().is_none());
        }
        assert_eq!(
            stored.jobs[0].instruction.as_ref().unwrap().requirement.cpu.as_deref(),
            Some("2")
        );

        let requests = f.matchmaker.requests.lock().unwrap();
        assert_eq!(requests[0].body, DESCRIPTOR.as_bytes());
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer t"));
    }

    #[tokio::test]
    async fn create_registers_group_with_policy_manager() {
        let f = fixture();
        let group = f
            .service
            .create_job_group(DESCRIPTOR.as_bytes(), Some("Bearer t"))
            .await
            .unwrap();
        let seen = f.policy.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (notification, token) = &seen[0];
        assert_eq!(notification.app_instance, group.id);
        assert_eq!(token.as_deref(), Some("Bearer t"));
        assert!(notification.app_descriptor.contains("name: shop"));
        assert!(!notification.app_descriptor.contains("kind: Deployment"));
    }

    #[tokio::test]
    async fn failed_notification_keeps_the_group() {
        let f = fixture_with(
            StubMatchmaker::new("edge-1"),
            RecordingPolicyManager {
                fail: true,
                ..RecordingPolicyManager::default()
            },
        );
        let group = f
            .service
            .create_job_group(DESCRIPTOR.as_bytes(), None)
            .await
            .unwrap();
        assert!(f.service.find_job_group(&group.id).is_ok());
    }

    #[tokio::test]
    async fn namespace_defaults_to_app_name() {
        let f = fixture();
        let body = DESCRIPTOR.replace("namespace: retail\n", "");
        let group = f.service.create_job_group(body.as_bytes(), None).await.unwrap();
        assert_eq!(group.jobs[0].namespace, group.app_name);
    }

    #[tokio::test]
    async fn component_without_manifests_gets_empty_contents() {
        let f = fixture();
        let body = DESCRIPTOR.replace("manifests: [{name: db-config}]", "manifests: [{name: redis}]");
        let group = f.service.create_job_group(body.as_bytes(), None).await.unwrap();
        let db = &group.jobs[1];
        assert!(db.instruction.as_ref().unwrap().contents.is_empty());
    }

    #[tokio::test]
    async fn matchmaking_failure_persists_nothing() {
        let f = fixture_with(StubMatchmaker::failing(), RecordingPolicyManager::default());
        let err = f
            .service
            .create_job_group(DESCRIPTOR.as_bytes(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::External);
        assert!(f.service.list_job_groups().unwrap().is_empty());
        assert!(f.policy.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn descriptor_without_components_is_invalid() {
        let f = fixture();
        let err = f
            .service
            .create_job_group(b"name: empty\n", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(f.matchmaker.requests.lock().unwrap().is_empty());
    }

    // ── Start / stop ───────────────────────────────────────────

    #[tokio::test]
    async fn start_reallocates_from_stored_group() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        f.matchmaker.move_to("edge-2");

        let started = f.service.start_job_group(&group.id, None).await.unwrap();
        for job in &started.jobs {
            assert_eq!(job.state, JobState::Created);
            assert_eq!(job.job_type, JobType::CreateDeployment);
            assert_eq!(job.target.as_ref().unwrap().cluster_name, "edge-2");
        }

        // The second request is a reconstructed descriptor, not the raw body.
        let requests = f.matchmaker.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let rebuilt = parse_descriptor(&requests[1].body).unwrap();
        assert_eq!(rebuilt.name, group.app_name);
        assert_eq!(rebuilt.manifests.len(), 2);
    }

    #[tokio::test]
    async fn stop_requires_every_job_deployed() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        let err = f.service.stop_job_group(&group.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // No partial mutation.
        let stored = f.service.find_job_group(&group.id).unwrap();
        assert!(stored.jobs.iter().all(|j| j.job_type == JobType::CreateDeployment));
    }

    #[tokio::test]
    async fn stop_requests_undeploy_and_is_idempotent() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);

        let stopped = f.service.stop_job_group(&group.id).unwrap();
        for job in &stopped.jobs {
            assert_eq!(job.state, JobState::Created);
            assert_eq!(job.job_type, JobType::DeleteDeployment);
            assert!(job.owner().is_none());
        }

        let again = f.service.stop_job_group(&group.id).unwrap();
        assert_eq!(again.jobs, stopped.jobs);
    }

    // ── Replace ────────────────────────────────────────────────

    #[tokio::test]
    async fn replace_merges_jobs_and_rearms_by_ownership() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        // Deploy only the first job.
        let web = &group.jobs[0];
        f.jobs.promote_job(&web.id, "driver-a").unwrap();
        f.jobs.report_job_state(&web.id, Some(Resource::default())).unwrap();

        let mut edited = f.service.find_job_group(&group.id).unwrap();
        edited.app_description = "v2".to_string();
        edited.jobs[0].namespace = "retail-v2".to_string();
        let body = serde_json::to_vec(&edited).unwrap();

        let replaced = f.service.replace_job_group(&body).unwrap();
        assert_eq!(replaced.app_description, "v2");
        assert_eq!(replaced.jobs[0].namespace, "retail-v2");
        assert_eq!(replaced.jobs[0].job_type, JobType::UpdateDeployment);
        assert_eq!(replaced.jobs[0].sub_type, Some(RemediationType::Replace));
        assert_eq!(replaced.jobs[1].job_type, JobType::CreateDeployment);
        for job in &replaced.jobs {
            assert_eq!(job.state, JobState::Created);
            assert!(job.ownership_consistent());
        }
        // The deployed resource survives the replace.
        assert!(f.store.find_job(&web.id).unwrap().unwrap().resource.is_some());
    }

    #[tokio::test]
    async fn replace_after_remediation_updates_live_deployment() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);
        let web = f.jobs.find_job(&group.jobs[0].id).unwrap();
        let rearmed = f
            .jobs
            .update_job_for_remediation(web, Remediation::pending(RemediationType::ScaleUp, ""))
            .unwrap();
        assert!(rearmed.owner().is_none());

        let edited = f.service.find_job_group(&group.id).unwrap();
        let replaced = f
            .service
            .replace_job_group(&serde_json::to_vec(&edited).unwrap())
            .unwrap();
        for job in &replaced.jobs {
            assert_eq!(job.job_type, JobType::UpdateDeployment);
            assert_eq!(job.sub_type, Some(RemediationType::Replace));
            assert!(job.resource.is_some());
        }
    }

    #[test]
    fn replace_rejects_unknown_group_and_bad_json() {
        let f = fixture();
        assert_eq!(
            f.service.replace_job_group(b"{").unwrap_err().kind(),
            ErrorKind::Validation
        );
        let ghost = serde_json::to_vec(&JobGroup::new("ghost", "")).unwrap();
        assert_eq!(
            f.service.replace_job_group(&ghost).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    // ── Delete ─────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_requires_undeployed_jobs() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);
        assert_eq!(
            f.service.delete_job_group(&group.id).unwrap_err().kind(),
            ErrorKind::Conflict
        );

        undeploy_all(&f, &group.id);
        f.service.delete_job_group(&group.id).unwrap();
        assert_eq!(
            f.service.find_job_group(&group.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(f.store.find_job(&group.jobs[0].id).unwrap().is_none());
    }

    // ── Reallocation ───────────────────────────────────────────

    #[tokio::test]
    async fn reallocation_teardown_is_redeployed_elsewhere() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);
        let web = f.jobs.find_job(&group.jobs[0].id).unwrap();

        let remediation =
            jobgrid_state::Remediation::pending(RemediationType::Reallocate, "");
        f.jobs.update_job_for_remediation(web.clone(), remediation).unwrap();
        f.jobs.promote_job(&web.id, "driver-a").unwrap();
        let torn_down = f.jobs.report_job_state(&web.id, None).unwrap();
        assert!(torn_down.resource.is_none());

        f.matchmaker.move_to("edge-9");
        let redeployed = f
            .service
            .after_report(&torn_down, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redeployed.state, JobState::Created);
        assert_eq!(redeployed.job_type, JobType::CreateDeployment);
        assert_eq!(redeployed.sub_type, None);
        assert_eq!(redeployed.target.unwrap().cluster_name, "edge-9");

        // The sibling job keeps its placement.
        let db = f.jobs.find_job(&group.jobs[1].id).unwrap();
        assert_eq!(db.target.unwrap().cluster_name, "edge-1");
    }

    #[tokio::test]
    async fn plain_reports_need_no_follow_up() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);
        let web = f.jobs.find_job(&group.jobs[0].id).unwrap();
        assert!(f.service.after_report(&web, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deployed_job_cannot_be_reallocated() {
        let f = fixture();
        let group = f.service.create_job_group(DESCRIPTOR.as_bytes(), None).await.unwrap();
        deploy_all(&f, &group);
        let err = f
            .service
            .reallocate_job(&group.jobs[0].id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
