//! Task model definitions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitoring subscription: one listings URL re-checked on an interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub url: String,
    /// Minutes between two checks
    pub interval_minutes: u32,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// The task stops being due after this instant
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create an active task that is due immediately and tracked for 30 days
    pub fn new(user_id: Uuid, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            url: url.into(),
            interval_minutes: 10,
            next_run_at: now,
            last_run_at: None,
            end_date: now + Duration::days(30),
            is_active: true,
            created_at: now,
        }
    }

    /// Set the check interval
    pub fn with_interval(mut self, minutes: u32) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Set the next scheduled check
    pub fn with_next_run_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_run_at = at;
        self
    }

    /// Set the expiry instant
    pub fn with_end_date(mut self, at: DateTime<Utc>) -> Self {
        self.end_date = at;
        self
    }

    /// Mark the task inactive
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    /// A task is due when it is active, its check time has arrived and it
    /// has not expired.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_run_at <= now && self.end_date >= now
    }

    /// The next check time for a run executed at `executed_at`
    pub fn next_run_after(&self, executed_at: DateTime<Utc>) -> DateTime<Utc> {
        executed_at + self.interval()
    }
}
