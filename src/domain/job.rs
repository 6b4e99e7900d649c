use std::time::Duration;

use chrono::{DateTime, Utc};

/// A pending one-shot run of a named hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub hook: String,
    pub due_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn new(hook: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        Self {
            hook: hook.into(),
            due_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at
    }

    /// Time left until the job is due, zero if it already is.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.due_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}
