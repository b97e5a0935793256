//! Task repository trait
//!
//! Defines the storage operations used to manage tasks on behalf of users.
//! Updates are field-scoped so that a user edit never overwrites the
//! schedule fields written by a concurrent run.

use async_trait::async_trait;
use uuid::Uuid;

use super::model::Task;
use crate::item::Item;
use crate::Result;

/// User-editable task fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub interval_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

/// Repository interface for task management
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task
    async fn create(&self, task: Task) -> Result<Task>;

    /// Create the task unless its user already has `max_active` active
    /// tasks. Counting and inserting happen as one unit of work, so
    /// concurrent calls cannot exceed the limit.
    async fn create_if_below(&self, task: Task, max_active: usize) -> Result<Task>;

    /// Get a task by ID
    async fn get(&self, id: Uuid) -> Result<Option<Task>>;

    /// All tasks of a user, newest first
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Task>>;

    /// Apply user edits and return the updated task
    async fn apply_changes(&self, id: Uuid, changes: TaskChanges) -> Result<Task>;

    /// Hard-delete a task together with all of its items
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Items recorded for a task, oldest first
    async fn list_items(&self, task_id: Uuid) -> Result<Vec<Item>>;
}
