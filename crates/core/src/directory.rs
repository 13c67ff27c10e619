//! Who holds which roles.
//!
//! Role-checked assignment looks the assignee up here; the caller never
//! supplies the assignee's roles.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Roles held by `user_id`. `NotFound` for unknown users.
    async fn roles_of(&self, user_id: &str) -> Result<Vec<String>, CoreError>;
}

/// In-process directory keyed by user id.
#[derive(Default)]
pub struct MemoryIdentityDirectory {
    users: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user's roles.
    pub async fn register<I, S>(&self, user_id: impl Into<String>, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users
            .write()
            .await
            .insert(user_id.into(), roles.into_iter().map(Into::into).collect());
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentityDirectory {
    async fn roles_of(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("User", user_id))
    }
}
