//! User model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner of tasks, addressed through an external endpoint (a chat id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Where notifications for this user are delivered
    pub endpoint: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            name: None,
            created_at: Utc::now(),
        }
    }
}
