//! Storage interface consumed by the scheduler
//!
//! Every call is its own unit of work: a call that returns `Ok` has been
//! committed, and a later failing call never undoes it.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::item::Candidate;
use crate::task::Task;
use crate::Result;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Tasks that are active, whose `next_run_at` has arrived and whose
    /// `end_date` has not passed
    async fn list_due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;

    /// Source ids of every item already recorded for the task
    async fn get_seen_item_ids(&self, task_id: Uuid) -> Result<HashSet<String>>;

    /// Record the candidates as seen items of the task.
    ///
    /// A candidate whose `(task_id, id)` is already stored is skipped, never
    /// an error. Returns the ids of the records created, in input order.
    async fn insert_items_if_absent(
        &self,
        task_id: Uuid,
        items: &[Candidate],
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Write the schedule fields only. Fails with `TaskNotFound` if the task
    /// no longer exists.
    async fn update_task_schedule(
        &self,
        task_id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Notification endpoint of the user. Fails with `UserNotFound`.
    async fn get_user_endpoint(&self, user_id: Uuid) -> Result<String>;
}
