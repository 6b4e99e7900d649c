//! One-shot job scheduling for the recurring batch run.
//!
//! A pending run is a single row keyed by hook name, so re-arming replaces
//! the previous job instead of adding another.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::Result;
use crate::domain::ScheduledJob;
use crate::store::Store;

/// Hook name of the recurring product update.
pub const UPDATE_HOOK: &str = "skufill_update_products";

/// Configuration for the recurring schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Lower bound of the delay before the next run, in seconds (default: 1800)
    pub min_offset_secs: u64,

    /// Upper bound of the delay before the next run, in seconds (default: 3600)
    pub max_offset_secs: u64,

    /// How often the daemon checks for a due job, in seconds (default: 60)
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_offset_secs: 1800,
            max_offset_secs: 3600,
            poll_interval_secs: 60,
        }
    }
}

impl ScheduleConfig {
    /// Random delay in `min_offset_secs..=max_offset_secs`.
    pub fn sample_offset(&self) -> Duration {
        if self.min_offset_secs >= self.max_offset_secs {
            return Duration::from_secs(self.min_offset_secs);
        }
        let secs = rand::rng().random_range(self.min_offset_secs..=self.max_offset_secs);
        Duration::from_secs(secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

pub struct Scheduler<S: Store> {
    store: Arc<S>,
    config: ScheduleConfig,
    hook: String,
}

impl<S: Store> Scheduler<S> {
    pub fn new(store: Arc<S>, config: ScheduleConfig) -> Self {
        Self {
            store,
            config,
            hook: UPDATE_HOOK.to_string(),
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// The pending job, if any.
    pub fn pending(&self) -> Result<Option<ScheduledJob>> {
        self.store.get_scheduled_job(&self.hook)
    }

    /// Arm a run unless one is already pending.
    pub fn install(&self) -> Result<ScheduledJob> {
        if let Some(job) = self.pending()? {
            debug!("{} already scheduled for {}", self.hook, job.due_at);
            return Ok(job);
        }
        self.arm(Utc::now())
    }

    /// Cancel the pending run. Returns whether one existed.
    pub fn uninstall(&self) -> Result<bool> {
        let removed = self.store.delete_scheduled_job(&self.hook)?;
        if removed {
            info!("Cancelled pending {}", self.hook);
        }
        Ok(removed)
    }

    /// Replace any pending run with a fresh one offset from now.
    pub fn rearm(&self) -> Result<ScheduledJob> {
        self.store.delete_scheduled_job(&self.hook)?;
        self.arm(Utc::now())
    }

    /// Remove and return the pending job if it is due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Option<ScheduledJob>> {
        match self.pending()? {
            Some(job) if job.is_due(now) => {
                self.store.delete_scheduled_job(&self.hook)?;
                Ok(Some(job))
            }
            _ => Ok(None),
        }
    }

    fn arm(&self, from: DateTime<Utc>) -> Result<ScheduledJob> {
        let offset = self.config.sample_offset();
        let due_at = from
            + chrono::Duration::from_std(offset)
                .unwrap_or_else(|_| chrono::Duration::seconds(self.config.max_offset_secs as i64));
        let job = ScheduledJob::new(self.hook.clone(), due_at);

        self.store.put_scheduled_job(&job)?;
        info!("Scheduled {} for {}", self.hook, job.due_at);

        Ok(job)
    }
}
