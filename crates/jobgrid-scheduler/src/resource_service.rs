//! ResourceService — observed-state reads and out-of-band status updates.

use std::sync::Arc;

use tracing::{Span, info};

use jobgrid_core::epoch_secs;
use jobgrid_state::{JobRepository, Resource, ResourceRepository};

use crate::error::{SchedulerError, SchedulerResult};

pub struct ResourceService {
    jobs: Arc<dyn JobRepository>,
    resources: Arc<dyn ResourceRepository>,
    log: Span,
}

impl ResourceService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        resources: Arc<dyn ResourceRepository>,
        log: Span,
    ) -> Self {
        Self {
            jobs,
            resources,
            log,
        }
    }

    pub fn find_resource_by_job(&self, job_id: &str) -> SchedulerResult<Resource> {
        if self.jobs.find_job(job_id)?.is_none() {
            return Err(SchedulerError::JobNotFound(job_id.to_string()));
        }
        self.resources
            .find_resource_by_job(job_id)?
            .ok_or_else(|| SchedulerError::ResourceNotFound(format!("no resource for job {job_id}")))
    }

    /// Replace the conditions (and remediation statuses) of the resource
    /// attached to `job_id` without touching the job's lifecycle.
    pub fn update_resource_state(&self, job_id: &str, mut update: Resource) -> SchedulerResult<Resource> {
        let current = self.find_resource_by_job(job_id)?;
        update.id = current.id.clone();
        update.job_id = current.job_id.clone();
        if update.name.is_empty() {
            update.name = current.name.clone();
        }
        if update.remediations.is_empty() {
            update.remediations = current.remediations;
        }
        self.resources.update_resource_state(&update)?;

        // Pushing status refreshes the job's lease.
        self.jobs.touch_job(job_id, epoch_secs())?;
        info!(parent: &self.log, job_id = %job_id, resource_id = %update.id, conditions = update.conditions.len(), "resource state updated");
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_state::{
        Condition, ConditionStatus, Instruction, Job, JobGroup, JobGroupRepository, JobState, JobType,
        Orchestrator, StateResult, StateStore,
    };

    fn setup(with_resource: bool) -> (StateStore, ResourceService, Job) {
        let store = StateStore::open_in_memory().unwrap();
        let mut group = JobGroup::new("shop", "");
        group.push_job(Job::new("", "shop", Instruction::default()));
        if with_resource {
            let job = &mut group.jobs[0];
            job.mark_claimed("A", 1);
            job.mark_finished(2);
            let mut resource = Resource::new(job.id.clone(), "web");
            resource
                .conditions
                .push(Condition::new("Progressing", ConditionStatus::True));
            job.resource = Some(resource);
        }
        store.save_job_group(&group).unwrap();
        let service = ResourceService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Span::none(),
        );
        (store, service, group.jobs.remove(0))
    }

    #[test]
    fn finds_resource_by_job() {
        let (_, service, job) = setup(true);
        let resource = service.find_resource_by_job(&job.id).unwrap();
        assert_eq!(resource.job_id, job.id);
        assert_eq!(resource.name, "web");
    }

    #[test]
    fn missing_job_and_missing_resource_are_distinct() {
        let (_, service, job) = setup(false);
        assert!(matches!(
            service.find_resource_by_job("nope").unwrap_err(),
            SchedulerError::JobNotFound(_)
        ));
        assert!(matches!(
            service.find_resource_by_job(&job.id).unwrap_err(),
            SchedulerError::ResourceNotFound(_)
        ));
    }

    #[test]
    fn update_replaces_conditions_and_keeps_identity() {
        let (store, service, job) = setup(true);
        let original = job.resource.clone().unwrap();
        let update = Resource {
            id: "ignored".to_string(),
            conditions: vec![Condition::new("Available", ConditionStatus::False)],
            ..Resource::default()
        };

        let stored = service.update_resource_state(&job.id, update).unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.name, "web");

        let reloaded = store.find_resource(&original.id).unwrap().unwrap();
        assert_eq!(reloaded.conditions.len(), 1);
        assert_eq!(reloaded.conditions[0].condition_type, "Available");
        assert_eq!(store.find_job(&job.id).unwrap().unwrap().state, job.state);
    }

    /// Lets another driver claim the job just before the lease refresh lands.
    struct ClaimsDuringPush(StateStore);

    impl JobRepository for ClaimsDuringPush {
        fn find_job(&self, id: &str) -> StateResult<Option<Job>> {
            self.0.find_job(id)
        }
        fn find_job_by_resource(&self, resource_id: &str) -> StateResult<Option<Job>> {
            self.0.find_job_by_resource(resource_id)
        }
        fn list_jobs(&self) -> StateResult<Vec<Job>> {
            self.0.list_jobs()
        }
        fn find_jobs_to_execute(
            &self,
            orchestrator: Orchestrator,
            owner_id: &str,
            stale_before: u64,
        ) -> StateResult<Vec<Job>> {
            self.0.find_jobs_to_execute(orchestrator, owner_id, stale_before)
        }
        fn claim_job(&self, id: &str, owner_id: &str, now: u64) -> StateResult<u64> {
            self.0.claim_job(id, owner_id, now)
        }
        fn touch_job(&self, id: &str, now: u64) -> StateResult<bool> {
            self.0.claim_job(id, "B", now)?;
            self.0.touch_job(id, now)
        }
        fn update_job(&self, job: &Job) -> StateResult<()> {
            self.0.update_job(job)
        }
        fn delete_job(&self, id: &str) -> StateResult<bool> {
            self.0.delete_job(id)
        }
    }

    #[test]
    fn push_keeps_a_concurrent_claim() {
        let (store, _, job) = setup(true);
        let mut rearmed = store.find_job(&job.id).unwrap().unwrap();
        rearmed.rearm(JobType::UpdateDeployment, None, 3);
        store.update_job(&rearmed).unwrap();

        let service = ResourceService::new(
            Arc::new(ClaimsDuringPush(store.clone())),
            Arc::new(store.clone()),
            Span::none(),
        );
        let update = Resource {
            conditions: vec![Condition::new("Available", ConditionStatus::True)],
            ..Resource::default()
        };
        service.update_resource_state(&job.id, update).unwrap();

        let stored = store.find_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.state, JobState::Progressing);
        assert_eq!(stored.owner(), Some("B"));
        assert_eq!(store.claim_job(&job.id, "C", 10).unwrap(), 0);
        let conditions = &stored.resource.unwrap().conditions;
        assert_eq!(conditions[0].condition_type, "Available");
    }
}
