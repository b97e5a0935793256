//! Task module
//!
//! This module contains task-related types and logic.

mod manager;
mod model;
mod repository;

pub use manager::{NewTask, TaskLimits, TaskManager};
pub use model::*;
pub use repository::{TaskChanges, TaskRepository};
