//! Route handlers

pub mod health;
pub mod task;
pub mod user;

use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

/// Map a core error onto a status code and JSON body
pub fn route_error(error: lw_core::Error) -> RouteError {
    let status = match &error {
        lw_core::Error::TaskNotFound(_) | lw_core::Error::UserNotFound(_) => StatusCode::NOT_FOUND,
        lw_core::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!(error = %error, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// All REST routes, without state
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(user::router())
        .merge(task::router())
}
