//! Lease configuration for claimed jobs.
//!
//! A claim is keyed by the owner id alone. A `Progressing` job whose
//! `updated_at` is older than the lease duration is offered back to the
//! same owner by the lease query; other owners never see it.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    duration: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(300),
        }
    }
}

impl LeaseConfig {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Claims last touched strictly before this instant are stale.
    pub fn stale_before(&self, now: u64) -> u64 {
        now.saturating_sub(self.duration.as_secs())
    }
}
