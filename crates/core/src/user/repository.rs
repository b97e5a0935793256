//! User repository trait

use async_trait::async_trait;
use uuid::Uuid;

use super::model::User;
use crate::Result;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create the user for `endpoint`, or update its display name if it
    /// already exists. Calling it twice with the same arguments is a no-op.
    async fn upsert_user(&self, endpoint: &str, name: Option<String>) -> Result<User>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
}
