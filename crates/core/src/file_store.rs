//! File-based storage implementation
//!
//! Stores users, tasks and seen items as one JSON document on disk. Every
//! mutation is applied to a copy of the state, written to disk and only then
//! swapped in, all under the write lock: a failed write leaves both memory
//! and disk untouched, and disk order equals commit order.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::item::{Candidate, Item};
use crate::repository::Repository;
use crate::task::{Task, TaskChanges, TaskRepository};
use crate::user::{User, UserRepository};
use crate::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    users: Vec<&'a User>,
    tasks: Vec<&'a Task>,
    items: Vec<&'a Item>,
}

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
    /// Items per task in insertion order
    items: HashMap<Uuid, Vec<Item>>,
    /// Unique index over `(task_id, source_id)`
    seen: HashMap<Uuid, HashSet<String>>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self {
            users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
            tasks: snapshot.tasks.into_iter().map(|t| (t.id, t)).collect(),
            ..Self::default()
        };
        for item in snapshot.items {
            state.insert_item(item);
        }
        state
    }

    fn snapshot(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            users: self.users.values().collect(),
            tasks: self.tasks.values().collect(),
            items: self.items.values().flatten().collect(),
        }
    }

    fn insert_task(&mut self, task: Task) -> Result<Task> {
        if self.tasks.contains_key(&task.id) {
            return Err(Error::InvalidInput(format!(
                "Task with ID {} already exists",
                task.id
            )));
        }
        if !self.users.contains_key(&task.user_id) {
            return Err(Error::UserNotFound(task.user_id.to_string()));
        }
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    /// Insert unless the `(task_id, source_id)` pair is already stored
    fn insert_item(&mut self, item: Item) -> bool {
        let fresh = self
            .seen
            .entry(item.task_id)
            .or_default()
            .insert(item.source_id.clone());
        if fresh {
            self.items.entry(item.task_id).or_default().push(item);
        }
        fresh
    }
}

/// JSON file store implementing every repository interface
pub struct FileStore {
    /// Path to the JSON file
    path: PathBuf,
    state: RwLock<State>,
}

impl FileStore {
    /// Open the store at `path`
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            State::from_snapshot(snapshot)
        } else {
            State::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Apply `change` and persist the result as one unit of work
    async fn commit<T>(&self, change: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(out)
    }

    async fn persist(&self, state: &State) -> Result<()> {
        let content = serde_json::to_string_pretty(&state.snapshot())?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for FileStore {
    async fn list_due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn get_seen_item_ids(&self, task_id: Uuid) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        Ok(state.seen.get(&task_id).cloned().unwrap_or_default())
    }

    async fn insert_items_if_absent(
        &self,
        task_id: Uuid,
        items: &[Candidate],
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let inserted: Vec<String> = self
            .commit(|state| {
                Ok(items
                    .iter()
                    .filter(|c| state.insert_item(Item::from_candidate(task_id, c, observed_at)))
                    .map(|c| c.id.clone())
                    .collect())
            })
            .await?;
        debug!(%task_id, offered = items.len(), inserted = inserted.len(), "Recorded items");
        Ok(inserted)
    }

    async fn update_task_schedule(
        &self,
        task_id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        self.commit(|state| {
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
            task.last_run_at = Some(last_run_at);
            task.next_run_at = next_run_at;
            Ok(())
        })
        .await
    }

    async fn get_user_endpoint(&self, user_id: Uuid) -> Result<String> {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(|u| u.endpoint.clone())
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }
}

#[async_trait]
impl TaskRepository for FileStore {
    async fn create(&self, task: Task) -> Result<Task> {
        self.commit(|state| state.insert_task(task)).await
    }

    async fn create_if_below(&self, task: Task, max_active: usize) -> Result<Task> {
        self.commit(|state| {
            let active = state
                .tasks
                .values()
                .filter(|t| t.user_id == task.user_id && t.is_active)
                .count();
            if active >= max_active {
                return Err(Error::InvalidInput(format!(
                    "Active task limit reached ({})",
                    max_active
                )));
            }
            state.insert_task(task)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        self.get_task(id).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Sort by created_at descending (newest first)
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn apply_changes(&self, id: Uuid, changes: TaskChanges) -> Result<Task> {
        self.commit(|state| {
            let task = state
                .tasks
                .get_mut(&id)
                .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
            if let Some(name) = changes.name {
                task.name = name;
            }
            if let Some(interval) = changes.interval_minutes {
                task.interval_minutes = interval;
            }
            if let Some(active) = changes.is_active {
                task.is_active = active;
            }
            Ok(task.clone())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        if self.get_task(id).await?.is_none() {
            return Ok(false);
        }
        self.commit(|state| {
            state.items.remove(&id);
            state.seen.remove(&id);
            Ok(state.tasks.remove(&id).is_some())
        })
        .await
    }

    async fn list_items(&self, task_id: Uuid) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        Ok(state.items.get(&task_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl UserRepository for FileStore {
    async fn upsert_user(&self, endpoint: &str, name: Option<String>) -> Result<User> {
        {
            let state = self.state.read().await;
            if let Some(user) = state.users.values().find(|u| u.endpoint == endpoint) {
                if user.name == name {
                    return Ok(user.clone());
                }
            }
        }
        self.commit(|state| {
            if let Some(user) = state.users.values_mut().find(|u| u.endpoint == endpoint) {
                user.name = name;
                return Ok(user.clone());
            }
            let mut user = User::new(endpoint);
            user.name = name;
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }
}
