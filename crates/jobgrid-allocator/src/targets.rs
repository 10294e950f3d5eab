//! Placement payload decoding.
//!
//! The matchmaker reports a component's placement as a single object, an
//! empty list when it found nowhere to put it, or occasionally some other
//! value that still carries target fields. Each shape is decoded
//! explicitly; anything else is an error rather than a guess.

use serde_json::Value;

use jobgrid_state::{Job, Target};

use crate::error::{AllocatorError, AllocatorResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TargetPayload {
    /// No placement: absent, `null`, or `[]`.
    NoTarget,
    SingleTarget(Target),
    /// Any other value, as YAML/JSON bytes awaiting a typed decode.
    RawTarget(Vec<u8>),
}

impl TargetPayload {
    pub fn decode(value: &Value) -> AllocatorResult<Self> {
        match value {
            Value::Null => Ok(Self::NoTarget),
            Value::Array(items) if items.is_empty() => Ok(Self::NoTarget),
            Value::Array(items) => Err(AllocatorError::UnexpectedTargetShape(format!(
                "list of {} targets, expected a single target",
                items.len()
            ))),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(Self::SingleTarget)
                .map_err(|e| AllocatorError::UnexpectedTargetShape(e.to_string())),
            // Some matchmakers embed the target as a YAML or JSON string.
            Value::String(s) => Ok(Self::RawTarget(s.clone().into_bytes())),
            other => serde_yaml::to_string(other)
                .map(|yaml| Self::RawTarget(yaml.into_bytes()))
                .map_err(|e| AllocatorError::UnexpectedTargetShape(e.to_string())),
        }
    }
}

/// Apply a component's placement payload to `job`.
pub fn assign_targets(job: &mut Job, payload: &Value) -> AllocatorResult<()> {
    match TargetPayload::decode(payload)? {
        TargetPayload::NoTarget => job.target = None,
        TargetPayload::SingleTarget(target) => job.set_target(target),
        TargetPayload::RawTarget(bytes) => {
            let target: Target = serde_yaml::from_slice(&bytes).map_err(|e| {
                AllocatorError::UnexpectedTargetShape(format!(
                    "{}: {e}",
                    String::from_utf8_lossy(&bytes).trim()
                ))
            })?;
            job.set_target(target);
        }
    }
    Ok(())
}
