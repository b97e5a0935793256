//! Task API endpoints
//!
//! Per-user task management and the listings recorded for a task.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lw_core::item::Item;
use lw_core::task::{NewTask, Task};

use super::{route_error, ErrorResponse, RouteError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub name: String,
    pub url: String,
    pub days: u32,
    /// Falls back to the minimum allowed interval
    #[serde(default)]
    pub interval_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub interval_minutes: u32,
    pub next_run_at: String,
    pub last_run_at: Option<String>,
    pub end_date: String,
    pub is_active: bool,
    pub created_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            name: task.name,
            url: task.url,
            interval_minutes: task.interval_minutes,
            next_run_at: task.next_run_at.to_rfc3339(),
            last_run_at: task.last_run_at.map(|t| t.to_rfc3339()),
            end_date: task.end_date.to_rfc3339(),
            is_active: task.is_active,
            created_at: task.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub title: String,
    pub url: String,
    pub price: String,
    pub published_at: Option<String>,
    pub observed_at: String,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.source_id,
            title: item.title,
            url: item.url,
            price: item.price,
            published_at: item.published_at,
            observed_at: item.observed_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/users/{user_id}/tasks - List the user's active tasks
async fn list_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    let tasks = state
        .manager()
        .list_active_tasks(user_id)
        .await
        .map_err(route_error)?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// POST /api/users/{user_id}/tasks - Create a task, due on the next tick
async fn create_task(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    let manager = state.manager();
    let request = NewTask {
        name: req.name,
        url: req.url,
        days: req.days,
        interval_minutes: req
            .interval_minutes
            .unwrap_or(manager.limits().min_interval_minutes),
    };
    let task = manager
        .create_task(user_id, request)
        .await
        .map_err(route_error)?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// PATCH /api/users/{user_id}/tasks/{task_id} - Rename or change the interval
async fn update_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, RouteError> {
    if req.name.is_none() && req.interval_minutes.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Nothing to update".to_string(),
            }),
        ));
    }

    let manager = state.manager();
    let mut updated = None;
    if let Some(name) = req.name {
        updated = Some(
            manager
                .rename_task(user_id, task_id, &name)
                .await
                .map_err(route_error)?,
        );
    }
    if let Some(minutes) = req.interval_minutes {
        updated = Some(
            manager
                .set_interval(user_id, task_id, minutes)
                .await
                .map_err(route_error)?,
        );
    }

    match updated {
        Some(task) => Ok(Json(TaskResponse::from(task))),
        None => Err(route_error(lw_core::Error::TaskNotFound(task_id.to_string()))),
    }
}

/// DELETE /api/users/{user_id}/tasks/{task_id} - Stop tracking, items are kept
async fn deactivate_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TaskResponse>, RouteError> {
    let task = state
        .manager()
        .deactivate_task(user_id, task_id)
        .await
        .map_err(route_error)?;
    Ok(Json(TaskResponse::from(task)))
}

/// GET /api/tasks/{task_id}/items - Listings recorded for a task
async fn list_items(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Vec<ItemResponse>>, RouteError> {
    let items = state
        .manager()
        .list_items(task_id)
        .await
        .map_err(route_error)?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/{user_id}/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/users/{user_id}/tasks/{task_id}",
            patch(update_task).delete(deactivate_task),
        )
        .route("/api/tasks/{task_id}/items", get(list_items))
}
