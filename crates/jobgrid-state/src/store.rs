//! StateStore — redb-backed persistence for job groups, jobs, and resources.
//!
//! Aggregates are split across tables so child rows can be replaced or
//! cascaded independently: a job record never embeds its resource, and a
//! resource record never embeds its conditions or remediations. Loading
//! reassembles them inside one read transaction.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}
pub(crate) use map_err;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        self.transaction(|txn| {
            // Opening a table in a write transaction creates it if absent.
            for table in [JOB_GROUPS, JOBS, JOB_RESOURCES, RESOURCES, CONDITIONS, REMEDIATIONS] {
                txn.open_table(table).map_err(map_err!(Table))?;
            }
            Ok(())
        })
    }

    /// Run `f` inside a write transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err` the transaction is aborted
    /// and the error returned. If `f` panics the transaction is aborted
    /// before the panic resumes, so no partial write is ever visible.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> StateResult<T>,
    ) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match panic::catch_unwind(AssertUnwindSafe(|| f(&txn))) {
            Ok(Ok(out)) => {
                txn.commit().map_err(map_err!(Transaction))?;
                Ok(out)
            }
            Ok(Err(e)) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "transaction abort failed");
                }
                Err(e)
            }
            Err(payload) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "transaction abort failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Open a consistent snapshot of every table.
    pub(crate) fn snapshot(&self) -> StateResult<Snapshot> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        Snapshot::new(&txn)
    }
}

// ── Generic row helpers ────────────────────────────────────────────

pub(crate) fn get_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateResult<Option<T>> {
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Keys and decoded values of every row whose key starts with `prefix`, in key order.
pub(crate) fn scan_prefix<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> StateResult<Vec<(String, T)>> {
    let mut rows = Vec::new();
    for entry in table.range(prefix..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        let decoded = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        rows.push((key.to_string(), decoded));
    }
    Ok(rows)
}

pub(crate) fn all_rows<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> StateResult<Vec<T>> {
    let mut rows = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        rows.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
    }
    Ok(rows)
}

pub(crate) fn put_json<T: Serialize>(
    txn: &WriteTransaction,
    def: JsonTable,
    key: &str,
    value: &T,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    let mut table = txn.open_table(def).map_err(map_err!(Table))?;
    table.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: JsonTable,
    key: &str,
) -> StateResult<Option<T>> {
    let table = txn.open_table(def).map_err(map_err!(Table))?;
    get_json(&table, key)
}

pub(crate) fn remove_key(txn: &WriteTransaction, def: JsonTable, key: &str) -> StateResult<bool> {
    let mut table = txn.open_table(def).map_err(map_err!(Table))?;
    let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
    Ok(existed)
}

/// Delete every row whose key starts with `prefix`. Returns the number removed.
pub(crate) fn remove_prefix(txn: &WriteTransaction, def: JsonTable, prefix: &str) -> StateResult<u64> {
    let mut table = txn.open_table(def).map_err(map_err!(Table))?;
    let keys: Vec<String> = {
        let mut keys = Vec::new();
        for entry in table.range(prefix..).map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        keys
    };
    for key in &keys {
        table.remove(key.as_str()).map_err(map_err!(Write))?;
    }
    Ok(keys.len() as u64)
}

fn child_prefix(parent: &str) -> String {
    format!("{parent}:")
}

// ── Aggregate writes (inside a transaction) ────────────────────────

/// Group row: the group without its jobs, which live in `JOBS`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct GroupRecord {
    pub id: JobGroupId,
    pub app_name: String,
    pub app_description: String,
    pub job_ids: Vec<JobId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl GroupRecord {
    fn from_group(group: &JobGroup) -> Self {
        Self {
            id: group.id.clone(),
            app_name: group.app_name.clone(),
            app_description: group.app_description.clone(),
            job_ids: group.jobs.iter().map(|j| j.id.clone()).collect(),
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

/// Write a job row and reconcile its resource.
///
/// `Some(resource)` replaces whatever resource the job had (conditions
/// fully replaced); `None` detaches and deletes any stored resource.
pub(crate) fn write_job(txn: &WriteTransaction, job: &Job) -> StateResult<()> {
    let previous: Option<ResourceId> = read_resource_index(txn, &job.id)?;
    match &job.resource {
        Some(resource) => {
            if let Some(old) = previous.filter(|old| *old != resource.id) {
                delete_resource_rows(txn, &old)?;
            }
            let mut resource = resource.clone();
            resource.job_id = job.id.clone();
            write_resource(txn, &resource)?;
        }
        None => {
            if let Some(old) = previous {
                delete_resource_rows(txn, &old)?;
            }
        }
    }

    let mut record = job.clone();
    record.resource = None;
    put_json(txn, JOBS, &job.id, &record)?;
    debug!(job_id = %job.id, state = %job.state, "job stored");
    Ok(())
}

fn read_resource_index(txn: &WriteTransaction, job_id: &str) -> StateResult<Option<ResourceId>> {
    let table = txn.open_table(JOB_RESOURCES).map_err(map_err!(Table))?;
    let id = match table.get(job_id).map_err(map_err!(Read))? {
        Some(guard) => Some(String::from_utf8_lossy(guard.value()).into_owned()),
        None => None,
    };
    Ok(id)
}

/// Upsert a resource row, replace its conditions, and upsert its remediations.
pub(crate) fn write_resource(txn: &WriteTransaction, resource: &Resource) -> StateResult<()> {
    let prefix = child_prefix(&resource.id);

    let mut record = resource.clone();
    record.conditions.clear();
    record.remediations.clear();
    put_json(txn, RESOURCES, &resource.id, &record)?;

    remove_prefix(txn, CONDITIONS, &prefix)?;
    for (seq, condition) in resource.conditions.iter().enumerate() {
        put_json(txn, CONDITIONS, &format!("{prefix}{seq:06}"), condition)?;
    }

    for remediation in &resource.remediations {
        let mut remediation = remediation.clone();
        remediation.resource_id = resource.id.clone();
        put_json(txn, REMEDIATIONS, &format!("{prefix}{}", remediation.id), &remediation)?;
    }

    if !resource.job_id.is_empty() {
        let mut index = txn.open_table(JOB_RESOURCES).map_err(map_err!(Table))?;
        index
            .insert(resource.job_id.as_str(), resource.id.as_bytes())
            .map_err(map_err!(Write))?;
    }
    Ok(())
}

/// Remove a resource and everything hanging off it. Returns rows removed
/// from the resource table (0 or 1).
pub(crate) fn delete_resource_rows(txn: &WriteTransaction, resource_id: &str) -> StateResult<u64> {
    let record: Option<Resource> = read_json(txn, RESOURCES, resource_id)?;
    let Some(record) = record else {
        return Ok(0);
    };
    let prefix = child_prefix(resource_id);
    let conditions = remove_prefix(txn, CONDITIONS, &prefix)?;
    let remediations = remove_prefix(txn, REMEDIATIONS, &prefix)?;
    remove_key(txn, RESOURCES, resource_id)?;
    if !record.job_id.is_empty() {
        remove_key(txn, JOB_RESOURCES, &record.job_id)?;
    }
    debug!(%resource_id, conditions, remediations, "resource deleted");
    Ok(1)
}

/// Remove a job and its resource. Returns true if the job existed.
pub(crate) fn delete_job_rows(txn: &WriteTransaction, job_id: &str) -> StateResult<bool> {
    if let Some(resource_id) = read_resource_index(txn, job_id)? {
        delete_resource_rows(txn, &resource_id)?;
    }
    remove_key(txn, JOBS, job_id)
}

pub(crate) fn write_group(txn: &WriteTransaction, group: &JobGroup) -> StateResult<()> {
    put_json(txn, JOB_GROUPS, &group.id, &GroupRecord::from_group(group))?;
    for job in &group.jobs {
        let mut job = job.clone();
        job.job_group_id = group.id.clone();
        write_job(txn, &job)?;
    }
    debug!(group_id = %group.id, jobs = group.jobs.len(), "job group stored");
    Ok(())
}

// ── Snapshot reads ─────────────────────────────────────────────────

type JsonReadTable = ReadOnlyTable<&'static str, &'static [u8]>;

/// Every table opened against a single read transaction.
pub(crate) struct Snapshot {
    pub groups: JsonReadTable,
    pub jobs: JsonReadTable,
    pub job_resources: JsonReadTable,
    pub resources: JsonReadTable,
    pub conditions: JsonReadTable,
    pub remediations: JsonReadTable,
}

impl Snapshot {
    fn new(txn: &ReadTransaction) -> StateResult<Self> {
        Ok(Self {
            groups: txn.open_table(JOB_GROUPS).map_err(map_err!(Table))?,
            jobs: txn.open_table(JOBS).map_err(map_err!(Table))?,
            job_resources: txn.open_table(JOB_RESOURCES).map_err(map_err!(Table))?,
            resources: txn.open_table(RESOURCES).map_err(map_err!(Table))?,
            conditions: txn.open_table(CONDITIONS).map_err(map_err!(Table))?,
            remediations: txn.open_table(REMEDIATIONS).map_err(map_err!(Table))?,
        })
    }

    pub fn resource(&self, id: &str) -> StateResult<Option<Resource>> {
        let Some(mut resource): Option<Resource> = get_json(&self.resources, id)? else {
            return Ok(None);
        };
        let prefix = child_prefix(id);
        resource.conditions = scan_prefix::<Condition>(&self.conditions, &prefix)?
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        let mut remediations: Vec<Remediation> = scan_prefix::<Remediation>(&self.remediations, &prefix)?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        remediations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        resource.remediations = remediations;
        Ok(Some(resource))
    }

    pub fn resource_for_job(&self, job_id: &str) -> StateResult<Option<Resource>> {
        let resource_id = match self.job_resources.get(job_id).map_err(map_err!(Read))? {
            Some(guard) => String::from_utf8_lossy(guard.value()).into_owned(),
            None => return Ok(None),
        };
        self.resource(&resource_id)
    }

    /// Attach the stored resource to a bare job row.
    pub fn hydrate(&self, mut job: Job) -> StateResult<Job> {
        job.resource = self.resource_for_job(&job.id)?;
        Ok(job)
    }

    pub fn job(&self, id: &str) -> StateResult<Option<Job>> {
        match get_json::<Job>(&self.jobs, id)? {
            Some(job) => Ok(Some(self.hydrate(job)?)),
            None => Ok(None),
        }
    }

    /// Bare job rows (no resources attached).
    pub fn job_rows(&self) -> StateResult<Vec<Job>> {
        all_rows(&self.jobs)
    }

    pub fn group(&self, id: &str) -> StateResult<Option<JobGroup>> {
        match get_json::<GroupRecord>(&self.groups, id)? {
            Some(record) => Ok(Some(self.assemble_group(record)?)),
            None => Ok(None),
        }
    }

    pub fn groups(&self) -> StateResult<Vec<JobGroup>> {
        all_rows::<GroupRecord>(&self.groups)?
            .into_iter()
            .map(|record| self.assemble_group(record))
            .collect()
    }

    fn assemble_group(&self, record: GroupRecord) -> StateResult<JobGroup> {
        let mut jobs = Vec::with_capacity(record.job_ids.len());
        for job_id in &record.job_ids {
            match self.job(job_id)? {
                Some(job) => jobs.push(job),
                None => {
                    return Err(StateError::NotFound(format!(
                        "job {job_id} of group {}",
                        record.id
                    )));
                }
            }
        }
        Ok(JobGroup {
            id: record.id,
            app_name: record.app_name,
            app_description: record.app_description,
            jobs,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
