//! User-facing task management
//!
//! Validates requests coming from the front-end before they reach storage.
//! Only name, interval and the active flag can be edited here; the schedule
//! fields belong to the runner.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use super::model::Task;
use super::repository::{TaskChanges, TaskRepository};
use crate::item::Item;
use crate::user::{User, UserRepository};
use crate::{Error, Result};

/// Bounds applied to user requests
#[derive(Debug, Clone)]
pub struct TaskLimits {
    pub min_interval_minutes: u32,
    pub max_active_tasks: usize,
    pub max_tracking_days: u32,
    pub min_name_len: usize,
    pub max_name_len: usize,
    /// Accepted URL prefix; empty accepts any URL
    pub url_prefix: String,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            min_interval_minutes: 10,
            max_active_tasks: 5,
            max_tracking_days: 30,
            min_name_len: 3,
            max_name_len: 50,
            url_prefix: "https://www.avito.ru/".to_string(),
        }
    }
}

/// A task creation request
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub url: String,
    /// How many days to keep checking
    pub days: u32,
    pub interval_minutes: u32,
}

/// Task management service over a repository
pub struct TaskManager<R> {
    repo: Arc<R>,
    limits: TaskLimits,
}

impl<R> TaskManager<R>
where
    R: TaskRepository + UserRepository,
{
    pub fn new(repo: Arc<R>, limits: TaskLimits) -> Self {
        Self { repo, limits }
    }

    pub fn limits(&self) -> &TaskLimits {
        &self.limits
    }

    /// Register a user on first contact, or refresh its display name
    pub async fn register_user(&self, endpoint: &str, name: Option<String>) -> Result<User> {
        if endpoint.trim().is_empty() {
            return Err(Error::InvalidInput("Endpoint cannot be empty".to_string()));
        }
        self.repo.upsert_user(endpoint.trim(), name).await
    }

    /// Create a task that becomes due on the next scheduler tick
    pub async fn create_task(&self, user_id: Uuid, request: NewTask) -> Result<Task> {
        let name = self.validate_name(&request.name)?;
        self.validate_url(&request.url)?;
        self.validate_interval(request.interval_minutes)?;
        if !(1..=self.limits.max_tracking_days).contains(&request.days) {
            return Err(Error::InvalidInput(format!(
                "Tracking period must be between 1 and {} days",
                self.limits.max_tracking_days
            )));
        }

        if self.repo.get_user(user_id).await?.is_none() {
            return Err(Error::UserNotFound(user_id.to_string()));
        }

        let now = Utc::now();
        let task = Task::new(user_id, name, request.url.trim())
            .with_interval(request.interval_minutes)
            .with_end_date(now + Duration::days(i64::from(request.days)))
            .with_next_run_at(now - Duration::minutes(2));
        let task = self
            .repo
            .create_if_below(task, self.limits.max_active_tasks)
            .await?;
        info!(task_id = %task.id, %user_id, "Created task");
        Ok(task)
    }

    pub async fn rename_task(&self, user_id: Uuid, task_id: Uuid, name: &str) -> Result<Task> {
        let name = self.validate_name(name)?;
        self.owned_task(user_id, task_id).await?;
        self.repo
            .apply_changes(
                task_id,
                TaskChanges {
                    name: Some(name),
                    ..TaskChanges::default()
                },
            )
            .await
    }

    /// Change the check interval. The current `next_run_at` is kept; the new
    /// interval applies from the next run on.
    pub async fn set_interval(&self, user_id: Uuid, task_id: Uuid, minutes: u32) -> Result<Task> {
        self.validate_interval(minutes)?;
        self.owned_task(user_id, task_id).await?;
        self.repo
            .apply_changes(
                task_id,
                TaskChanges {
                    interval_minutes: Some(minutes),
                    ..TaskChanges::default()
                },
            )
            .await
    }

    /// Soft delete: the task stops being due, its items are kept
    pub async fn deactivate_task(&self, user_id: Uuid, task_id: Uuid) -> Result<Task> {
        self.owned_task(user_id, task_id).await?;
        let task = self
            .repo
            .apply_changes(
                task_id,
                TaskChanges {
                    is_active: Some(false),
                    ..TaskChanges::default()
                },
            )
            .await?;
        info!(%task_id, %user_id, "Deactivated task");
        Ok(task)
    }

    pub async fn list_active_tasks(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let tasks = self.repo.list_by_user(user_id).await?;
        Ok(tasks.into_iter().filter(|t| t.is_active).collect())
    }

    pub async fn list_items(&self, task_id: Uuid) -> Result<Vec<Item>> {
        if self.repo.get(task_id).await?.is_none() {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        self.repo.list_items(task_id).await
    }

    /// Tasks of other users are reported as missing
    async fn owned_task(&self, user_id: Uuid, task_id: Uuid) -> Result<Task> {
        match self.repo.get(task_id).await? {
            Some(task) if task.user_id == user_id => Ok(task),
            _ => Err(Error::TaskNotFound(task_id.to_string())),
        }
    }

    fn validate_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        let len = name.chars().count();
        if len < self.limits.min_name_len || len > self.limits.max_name_len {
            return Err(Error::InvalidInput(format!(
                "Task name must be {} to {} characters long",
                self.limits.min_name_len, self.limits.max_name_len
            )));
        }
        Ok(name.to_string())
    }

    fn validate_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() || !url.starts_with(&self.limits.url_prefix) {
            return Err(Error::InvalidInput(format!(
                "URL must start with {}",
                self.limits.url_prefix
            )));
        }
        Ok(())
    }

    fn validate_interval(&self, minutes: u32) -> Result<()> {
        if minutes < self.limits.min_interval_minutes {
            return Err(Error::InvalidInput(format!(
                "Interval must be at least {} minutes",
                self.limits.min_interval_minutes
            )));
        }
        Ok(())
    }
}
