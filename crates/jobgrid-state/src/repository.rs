//! Repository gateway — narrow persistence interfaces per aggregate.
//!
//! Services depend on these traits, never on [`StateStore`] directly, so
//! tests can substitute failing or instrumented implementations. The
//! store implements all of them; every multi-row mutation runs inside a
//! single [`StateStore::transaction`].

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::*;
use crate::tables::*;
use crate::types::*;

pub trait JobRepository: Send + Sync {
    fn find_job(&self, id: &str) -> StateResult<Option<Job>>;

    fn find_job_by_resource(&self, resource_id: &str) -> StateResult<Option<Job>>;

    fn list_jobs(&self) -> StateResult<Vec<Job>>;

    /// Jobs a driver may claim: every `Created` job for `orchestrator`, plus
    /// `Progressing` jobs for `orchestrator` held by `owner_id` whose last
    /// update is strictly before `stale_before` (Unix seconds).
    fn find_jobs_to_execute(
        &self,
        orchestrator: Orchestrator,
        owner_id: &str,
        stale_before: u64,
    ) -> StateResult<Vec<Job>>;

    /// Conditional claim: moves the job to `Progressing` owned by
    /// `owner_id` only if it is currently `Created`. Returns the number
    /// of jobs changed, so 1 means the caller won the claim.
    fn claim_job(&self, id: &str, owner_id: &str, now: u64) -> StateResult<u64>;

    /// Bump a job's `updated_at` and nothing else. Returns false if the
    /// job does not exist.
    fn touch_job(&self, id: &str, now: u64) -> StateResult<bool>;

    /// Persist a job and its attached resource in one transaction.
    fn update_job(&self, job: &Job) -> StateResult<()>;

    fn delete_job(&self, id: &str) -> StateResult<bool>;
}

pub trait JobGroupRepository: Send + Sync {
    /// Insert a group and all of its jobs as one unit.
    fn save_job_group(&self, group: &JobGroup) -> StateResult<()>;

    /// Overwrite an existing group. Jobs no longer listed are deleted.
    fn update_job_group(&self, group: &JobGroup) -> StateResult<()>;

    fn find_job_group(&self, id: &str) -> StateResult<Option<JobGroup>>;

    fn list_job_groups(&self) -> StateResult<Vec<JobGroup>>;

    /// Cascade-delete a group, its jobs, and their resources.
    fn delete_job_group(&self, id: &str) -> StateResult<bool>;
}

pub trait ResourceRepository: Send + Sync {
    fn find_resource(&self, id: &str) -> StateResult<Option<Resource>>;

    fn find_resource_by_job(&self, job_id: &str) -> StateResult<Option<Resource>>;

    /// Replace a stored resource's conditions (and upsert any remediations
    /// it carries). Fails with `NotFound` if the resource does not exist.
    fn update_resource_state(&self, resource: &Resource) -> StateResult<()>;

    /// Delete a resource with its conditions and remediations and store
    /// `job`, detached from it, in the same transaction. Fails with
    /// `NotFound`, writing nothing, if the resource does not exist.
    fn release_resource(&self, id: &str, job: &Job) -> StateResult<()>;
}

/// Remediations are written with their resource through
/// [`JobRepository::update_job`]; this side only reads history.
pub trait PolicyRepository: Send + Sync {
    fn list_remediations(&self, resource_id: &str) -> StateResult<Vec<Remediation>>;
}

// ── StateStore implementations ─────────────────────────────────────

impl JobRepository for StateStore {
    fn find_job(&self, id: &str) -> StateResult<Option<Job>> {
        self.snapshot()?.job(id)
    }

    fn find_job_by_resource(&self, resource_id: &str) -> StateResult<Option<Job>> {
        let snapshot = self.snapshot()?;
        let Some(resource) = get_json::<Resource>(&snapshot.resources, resource_id)? else {
            return Ok(None);
        };
        snapshot.job(&resource.job_id)
    }

    fn list_jobs(&self) -> StateResult<Vec<Job>> {
        let snapshot = self.snapshot()?;
        snapshot
            .job_rows()?
            .into_iter()
            .map(|job| snapshot.hydrate(job))
            .collect()
    }

    fn find_jobs_to_execute(
        &self,
        orchestrator: Orchestrator,
        owner_id: &str,
        stale_before: u64,
    ) -> StateResult<Vec<Job>> {
        let snapshot = self.snapshot()?;
        let mut eligible = Vec::new();
        for job in snapshot.job_rows()? {
            if job.orchestrator != orchestrator {
                continue;
            }
            let claimable = match job.state {
                JobState::Created => true,
                JobState::Progressing => {
                    job.owner() == Some(owner_id) && job.updated_at < stale_before
                }
                JobState::Finished | JobState::Degraded => false,
            };
            if claimable {
                eligible.push(snapshot.hydrate(job)?);
            }
        }
        eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(eligible)
    }

    fn claim_job(&self, id: &str, owner_id: &str, now: u64) -> StateResult<u64> {
        let affected = self.transaction(|txn| {
            let Some(mut job) = read_json::<Job>(txn, JOBS, id)? else {
                return Ok(0);
            };
            if job.state != JobState::Created {
                return Ok(0);
            }
            job.mark_claimed(owner_id, now);
            put_json(txn, JOBS, id, &job)?;
            Ok(1)
        })?;
        debug!(job_id = %id, owner = %owner_id, affected, "claim attempted");
        Ok(affected)
    }

    fn touch_job(&self, id: &str, now: u64) -> StateResult<bool> {
        self.transaction(|txn| {
            let Some(mut job) = read_json::<Job>(txn, JOBS, id)? else {
                return Ok(false);
            };
            job.updated_at = now;
            put_json(txn, JOBS, id, &job)?;
            Ok(true)
        })
    }

    fn update_job(&self, job: &Job) -> StateResult<()> {
        self.transaction(|txn| write_job(txn, job))
    }

    fn delete_job(&self, id: &str) -> StateResult<bool> {
        let existed = self.transaction(|txn| {
            let job: Option<Job> = read_json(txn, JOBS, id)?;
            let Some(job) = job else {
                return Ok(false);
            };
            // Unlink from the owning group so the group still assembles.
            if let Some(mut record) = read_json::<GroupRecord>(txn, JOB_GROUPS, &job.job_group_id)? {
                record.job_ids.retain(|j| j != id);
                put_json(txn, JOB_GROUPS, &record.id, &record)?;
            }
            delete_job_rows(txn, id)
        })?;
        debug!(job_id = %id, existed, "job deleted");
        Ok(existed)
    }
}

impl JobGroupRepository for StateStore {
    fn save_job_group(&self, group: &JobGroup) -> StateResult<()> {
        self.transaction(|txn| write_group(txn, group))
    }

    fn update_job_group(&self, group: &JobGroup) -> StateResult<()> {
        self.transaction(|txn| {
            let Some(previous) = read_json::<GroupRecord>(txn, JOB_GROUPS, &group.id)? else {
                return Err(StateError::NotFound(format!("job group {}", group.id)));
            };
            for stale in previous
                .job_ids
                .iter()
                .filter(|id| !group.jobs.iter().any(|j| &j.id == *id))
            {
                delete_job_rows(txn, stale)?;
            }
            write_group(txn, group)
        })
    }

    fn find_job_group(&self, id: &str) -> StateResult<Option<JobGroup>> {
        self.snapshot()?.group(id)
    }

    fn list_job_groups(&self) -> StateResult<Vec<JobGroup>> {
        let mut groups = self.snapshot()?.groups()?;
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    fn delete_job_group(&self, id: &str) -> StateResult<bool> {
        let existed = self.transaction(|txn| {
            let Some(record) = read_json::<GroupRecord>(txn, JOB_GROUPS, id)? else {
                return Ok(false);
            };
            for job_id in &record.job_ids {
                delete_job_rows(txn, job_id)?;
            }
            remove_key(txn, JOB_GROUPS, id)
        })?;
        debug!(group_id = %id, existed, "job group deleted");
        Ok(existed)
    }
}

impl ResourceRepository for StateStore {
    fn find_resource(&self, id: &str) -> StateResult<Option<Resource>> {
        self.snapshot()?.resource(id)
    }

    fn find_resource_by_job(&self, job_id: &str) -> StateResult<Option<Resource>> {
        self.snapshot()?.resource_for_job(job_id)
    }

    fn update_resource_state(&self, resource: &Resource) -> StateResult<()> {
        self.transaction(|txn| {
            let Some(stored) = read_json::<Resource>(txn, RESOURCES, &resource.id)? else {
                return Err(StateError::NotFound(format!("resource {}", resource.id)));
            };
            let mut resource = resource.clone();
            resource.job_id = stored.job_id;
            write_resource(txn, &resource)
        })
    }

    fn release_resource(&self, id: &str, job: &Job) -> StateResult<()> {
        self.transaction(|txn| {
            if delete_resource_rows(txn, id)? == 0 {
                return Err(StateError::NotFound(format!("resource {id}")));
            }
            let mut job = job.clone();
            job.resource = None;
            write_job(txn, &job)
        })
    }
}

impl PolicyRepository for StateStore {
    fn list_remediations(&self, resource_id: &str) -> StateResult<Vec<Remediation>> {
        Ok(self
            .snapshot()?
            .resource(resource_id)?
            .map(|r| r.remediations)
            .unwrap_or_default())
    }
}
