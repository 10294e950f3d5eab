//! JobService — claim, report, lease query, and remediation re-arm.

use std::sync::Arc;

use tracing::{Span, debug, info, warn};

use jobgrid_core::epoch_secs;
use jobgrid_state::{
    Job, JobRepository, JobState, JobType, Orchestrator, Remediation, RemediationType, Resource,
    ResourceRepository, new_id,
};

use crate::error::{SchedulerError, SchedulerResult};
use crate::lease::LeaseConfig;

pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    resources: Arc<dyn ResourceRepository>,
    lease: LeaseConfig,
    log: Span,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        resources: Arc<dyn ResourceRepository>,
        lease: LeaseConfig,
        log: Span,
    ) -> Self {
        Self {
            jobs,
            resources,
            lease,
            log,
        }
    }

    pub fn find_job(&self, id: &str) -> SchedulerResult<Job> {
        require("job id", id)?;
        self.jobs
            .find_job(id)?
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))
    }

    pub fn find_job_by_resource(&self, resource_id: &str) -> SchedulerResult<Job> {
        require("resource id", resource_id)?;
        self.jobs
            .find_job_by_resource(resource_id)?
            .ok_or_else(|| SchedulerError::ResourceNotFound(resource_id.to_string()))
    }

    pub fn list_jobs(&self) -> SchedulerResult<Vec<Job>> {
        Ok(self.jobs.list_jobs()?)
    }

    /// Jobs `owner_id` may claim on `orchestrator` right now.
    pub fn find_jobs_to_execute(
        &self,
        orchestrator: &str,
        owner_id: &str,
    ) -> SchedulerResult<Vec<Job>> {
        self.find_jobs_to_execute_at(orchestrator, owner_id, epoch_secs())
    }

    /// Lease query evaluated at `now` (Unix seconds).
    pub fn find_jobs_to_execute_at(
        &self,
        orchestrator: &str,
        owner_id: &str,
        now: u64,
    ) -> SchedulerResult<Vec<Job>> {
        let orchestrator = parse_orchestrator(orchestrator)?;
        require("owner id", owner_id)?;
        let jobs =
            self.jobs
                .find_jobs_to_execute(orchestrator, owner_id, self.lease.stale_before(now))?;
        debug!(parent: &self.log, %orchestrator, owner = %owner_id, count = jobs.len(), "lease query");
        Ok(jobs)
    }

    /// Claim a `Created` job for `owner_id`.
    ///
    /// The state check and the owner assignment are one conditional write;
    /// of any number of concurrent claims exactly one succeeds.
    pub fn promote_job(&self, id: &str, owner_id: &str) -> SchedulerResult<Job> {
        self.promote_job_at(id, owner_id, epoch_secs())
    }

    pub fn promote_job_at(&self, id: &str, owner_id: &str, now: u64) -> SchedulerResult<Job> {
        require("job id", id)?;
        require("owner id", owner_id)?;
        let job = self.find_job(id)?;
        if job.state != JobState::Created {
            return Err(SchedulerError::JobCannotBePromoted {
                id: id.to_string(),
                state: job.state,
            });
        }

        if self.jobs.claim_job(id, owner_id, now)? != 1 {
            // Lost the race; report what the winner left behind.
            let state = self.find_job(id)?.state;
            return Err(SchedulerError::JobCannotBePromoted {
                id: id.to_string(),
                state,
            });
        }

        let job = self.find_job(id)?;
        info!(parent: &self.log, job_id = %id, owner = %owner_id, "job claimed");
        Ok(job)
    }

    /// Record a driver's execution outcome.
    ///
    /// A report on a job that is not `Progressing` and owned is rejected
    /// and the job is moved to `Degraded`. A failed resource deletion for
    /// an undeploy also degrades the job, but is returned as the job's new
    /// state rather than an error.
    pub fn report_job_state(&self, id: &str, reported: Option<Resource>) -> SchedulerResult<Job> {
        let mut job = self.find_job(id)?;
        let now = epoch_secs();

        let violation = if job.state != JobState::Progressing {
            Some(format!("expected state Progressing, got {}", job.state))
        } else if !job.is_owned() {
            Some("job has no owner".to_string())
        } else {
            None
        };
        if let Some(reason) = violation {
            job.mark_degraded(now);
            self.jobs.update_job(&job)?;
            warn!(parent: &self.log, job_id = %id, %reason, "report rejected, job degraded");
            return Err(SchedulerError::ReportRejected {
                id: id.to_string(),
                reason,
            });
        }

        match job.job_type {
            JobType::CreateDeployment | JobType::UpdateDeployment => {
                let reported = reported.ok_or_else(|| {
                    SchedulerError::Validation(format!(
                        "{} report for job {id} carries no resource",
                        job.job_type
                    ))
                })?;
                job.resource = Some(merge_reported(&job, reported));
                job.mark_finished(now);
            }
            JobType::DeleteDeployment => {
                let mut finished = job.clone();
                finished.resource = None;
                finished.owner_id = None;
                finished.mark_finished(now);

                if let Some(resource_id) = job.resource.as_ref().map(|r| r.id.clone()) {
                    // The resource goes and the job finishes in one write.
                    if let Err(e) = self.resources.release_resource(&resource_id, &finished) {
                        job.mark_degraded(now);
                        self.jobs.update_job(&job)?;
                        warn!(parent: &self.log, job_id = %id, %resource_id, error = %e, "resource deletion failed, job degraded");
                        return Ok(job);
                    }
                    info!(parent: &self.log, job_id = %id, job_type = %finished.job_type, "job finished");
                    return Ok(finished);
                }
                job = finished;
            }
        }

        self.jobs.update_job(&job)?;
        info!(parent: &self.log, job_id = %id, job_type = %job.job_type, "job finished");
        Ok(job)
    }

    /// Re-arm a finished, owned job so a driver applies `remediation`.
    ///
    /// `reallocate` tears the deployment down (`DeleteDeployment`); every
    /// other type updates it in place (`UpdateDeployment`). The remediation
    /// is appended to the job's resource in the same write.
    pub fn update_job_for_remediation(
        &self,
        mut job: Job,
        mut remediation: Remediation,
    ) -> SchedulerResult<Job> {
        let reject = |reason: String| SchedulerError::InvalidTransition {
            id: job.id.clone(),
            action: "remediated",
            reason,
        };
        if job.state != JobState::Finished {
            return Err(reject(format!("expected state Finished, got {}", job.state)));
        }
        if !job.is_owned() {
            return Err(reject("job has no owner".to_string()));
        }
        let Some(resource_id) = job.resource.as_ref().map(|r| r.id.clone()) else {
            return Err(reject("job has no resource".to_string()));
        };

        let (job_type, sub_type) = match remediation.remediation_type {
            RemediationType::Reallocate => (JobType::DeleteDeployment, RemediationType::Reallocate),
            other => (JobType::UpdateDeployment, other),
        };
        remediation.resource_id = resource_id;
        if let Some(resource) = job.resource.as_mut() {
            resource.remediations.push(remediation.clone());
        }
        job.rearm(job_type, Some(sub_type), epoch_secs());
        self.jobs.update_job(&job)?;

        info!(
            parent: &self.log,
            job_id = %job.id,
            remediation = %remediation.remediation_type,
            job_type = %job.job_type,
            "job re-armed for remediation"
        );
        Ok(job)
    }

    pub fn update_job(&self, job: &Job) -> SchedulerResult<()> {
        Ok(self.jobs.update_job(job)?)
    }

    /// Delete a single job once it has been undeployed.
    pub fn delete_job(&self, id: &str) -> SchedulerResult<()> {
        let job = self.find_job(id)?;
        if job.job_type != JobType::DeleteDeployment
            || !matches!(job.state, JobState::Finished | JobState::Created)
        {
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                action: "deleted",
                reason: format!("job is {} {}, undeploy it first", job.job_type, job.state),
            });
        }
        self.jobs.delete_job(id)?;
        info!(parent: &self.log, job_id = %id, "job deleted");
        Ok(())
    }
}

fn require(what: &str, value: &str) -> SchedulerResult<()> {
    if value.trim().is_empty() {
        return Err(SchedulerError::Validation(format!("{what} is required")));
    }
    Ok(())
}

fn parse_orchestrator(value: &str) -> SchedulerResult<Orchestrator> {
    match value.parse::<Orchestrator>() {
        Ok(Orchestrator::None) => Err(SchedulerError::Validation(
            "orchestrator is required".to_string(),
        )),
        Ok(orchestrator) => Ok(orchestrator),
        Err(e) => Err(SchedulerError::Validation(e)),
    }
}

/// Fold a driver's reported resource into the job's existing one.
///
/// The stored identity and remediation history win; conditions come from
/// the report. A reported remediation with a known id updates that
/// remediation's status.
fn merge_reported(job: &Job, mut reported: Resource) -> Resource {
    reported.job_id = job.id.clone();
    match &job.resource {
        Some(existing) => {
            reported.id = existing.id.clone();
            if reported.name.is_empty() {
                reported.name = existing.name.clone();
            }
            let mut remediations = existing.remediations.clone();
            for remediation in &mut remediations {
                if let Some(update) = reported.remediations.iter().find(|r| r.id == remediation.id) {
                    remediation.status = update.status;
                }
            }
            reported.remediations = remediations;
        }
        None => {
            if reported.id.is_empty() {
                reported.id = new_id();
            }
            reported.remediations.clear();
        }
    }
    reported
}
