//! User registration

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lw_core::user::User;

use super::{route_error, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub endpoint: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub endpoint: String,
    pub name: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            endpoint: user.endpoint,
            name: user.name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// POST /api/users - Register a user by delivery endpoint, idempotent
async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<Json<UserResponse>, RouteError> {
    let user = state
        .manager()
        .register_user(&req.endpoint, req.name)
        .await
        .map_err(route_error)?;
    Ok(Json(UserResponse::from(user)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users", post(register_user))
}
