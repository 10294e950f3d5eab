//! redb table definitions for the jobgrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).
//! Child rows use `{parent_id}:{child}` keys so a parent's children are a
//! contiguous key range.

use redb::TableDefinition;

pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Job group records (ordered job ids, no embedded jobs) keyed by `{group_id}`.
pub const JOB_GROUPS: JsonTable = TableDefinition::new("job_groups");

/// Job records (instruction embedded, resource detached) keyed by `{job_id}`.
pub const JOBS: JsonTable = TableDefinition::new("jobs");

/// Job to resource index: `{job_id}` -> resource id as UTF-8 bytes.
pub const JOB_RESOURCES: JsonTable = TableDefinition::new("job_resources");

/// Resource records (conditions and remediations detached) keyed by `{resource_id}`.
pub const RESOURCES: JsonTable = TableDefinition::new("resources");

/// Conditions keyed by `{resource_id}:{seq:06}`, in report order.
pub const CONDITIONS: JsonTable = TableDefinition::new("conditions");

/// Remediations keyed by `{resource_id}:{remediation_id}`.
pub const REMEDIATIONS: JsonTable = TableDefinition::new("remediations");
