//! PolicyService — incompliance notifications into job re-arms.

use std::sync::Arc;

use tracing::{Span, info};

use jobgrid_scheduler::{JobService, SchedulerError};
use jobgrid_state::{JobState, PolicyRepository, Remediation};

use crate::error::{PolicyError, PolicyResult};
use crate::incompliance::Incompliance;

pub struct PolicyService {
    jobs: Arc<JobService>,
    policies: Arc<dyn PolicyRepository>,
    log: Span,
}

impl PolicyService {
    pub fn new(jobs: Arc<JobService>, policies: Arc<dyn PolicyRepository>, log: Span) -> Self {
        Self {
            jobs,
            policies,
            log,
        }
    }

    /// Turn a raw incompliance notification into a pending remediation and
    /// re-arm the job that owns the offending resource.
    ///
    /// The job must be owned, `Finished`, and carry a resource. Each unmet
    /// precondition is its own error and nothing is written.
    pub fn handle_policy_incompliance(&self, body: &[u8]) -> PolicyResult<Remediation> {
        let incompliance = Incompliance::parse(body)?;
        let remediation = incompliance.to_remediation()?;

        let job = self.jobs.find_job_by_resource(&remediation.resource_id)?;

        if !job.is_owned() {
            return Err(PolicyError::JobUnowned { job_id: job.id });
        }
        if job.state != JobState::Finished {
            return Err(PolicyError::JobNotFinished {
                job_id: job.id,
                state: job.state,
            });
        }
        let Some(resource) = &job.resource else {
            return Err(PolicyError::JobWithoutResource { job_id: job.id });
        };

        let mut remediation = remediation;
        remediation.resource_id = resource.id.clone();
        let job = self.jobs.update_job_for_remediation(job, remediation.clone())?;
        info!(
            parent: &self.log,
            job_id = %job.id,
            resource_id = %remediation.resource_id,
            remediation = %remediation.remediation_type,
            notification = %incompliance.id,
            "incompliance accepted"
        );
        Ok(remediation)
    }

    /// Remediation history of a resource, oldest first.
    pub fn list_remediations(&self, resource_id: &str) -> PolicyResult<Vec<Remediation>> {
        let mut remediations = self
            .policies
            .list_remediations(resource_id)
            .map_err(SchedulerError::from)?;
        remediations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(remediations)
    }
}
