//! In-memory storage implementation.
//!
//! Suitable for development and tests; state does not survive restarts.

use crate::errors::StorageError;
use crate::oauth::types::{DEFAULT_ROLES, NewUser, RefreshTokenRecord, User, generate_user_id};
use crate::storage::traits::{AuthStorage, RefreshTokenStore, Result, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory implementation of [`AuthStorage`]
#[derive(Default)]
pub struct MemoryAuthStorage {
    users: Mutex<HashMap<String, User>>,
    // wikimedia_id -> internal user id
    wikimedia_index: Mutex<HashMap<String, String>>,
    refresh_tokens: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl MemoryAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::DatabaseError(format!("Lock error: {}", err))
}

#[async_trait]
impl UserStore for MemoryAuthStorage {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.lock().map_err(lock_error)?;
        Ok(users.get(id).cloned())
    }

    async fn get_user_by_wikimedia_id(&self, wikimedia_id: &str) -> Result<Option<User>> {
        let index = self.wikimedia_index.lock().map_err(lock_error)?;
        let users = self.users.lock().map_err(lock_error)?;
        Ok(index.get(wikimedia_id).and_then(|id| users.get(id)).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut index = self.wikimedia_index.lock().map_err(lock_error)?;
        let mut users = self.users.lock().map_err(lock_error)?;
        let now = Utc::now();

        // Upsert keyed on provider identity: a second create for the same
        // wikimedia_id updates the existing row, keeping its internal id.
        if let Some(existing_id) = index.get(&new_user.wikimedia_id) {
            let user = users
                .get_mut(existing_id)
                .ok_or_else(|| StorageError::InvalidData("dangling wikimedia index".to_string()))?;
            user.username = new_user.username;
            user.email = new_user.email.or(user.email.take());
            user.avatar_url = new_user.avatar_url.or(user.avatar_url.take());
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: generate_user_id(),
            username: new_user.username,
            wikimedia_id: Some(new_user.wikimedia_id.clone()),
            email: new_user.email,
            avatar_url: new_user.avatar_url,
            roles: new_user
                .roles
                .unwrap_or_else(|| DEFAULT_ROLES.iter().map(|r| r.to_string()).collect()),
            last_login: Some(now),
            created_at: now,
            updated_at: now,
        };
        index.insert(new_user.wikimedia_id, user.id.clone());
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().map_err(lock_error)?;
        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        users.insert(updated.id.clone(), updated);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryAuthStorage {
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        let mut tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        Ok(tokens
            .get(token)
            .filter(|record| record.expires_at > Utc::now())
            .cloned())
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        let mut tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        tokens.remove(token);
        Ok(())
    }
}

#[async_trait]
impl AuthStorage for MemoryAuthStorage {
    async fn initialize(&self) -> Result<()> {
        // No schema to create.
        Ok(())
    }
}
