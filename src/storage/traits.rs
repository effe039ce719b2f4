//! Storage trait definitions for users and refresh tokens.
//!
//! Defines the async capability interface implemented by each backend so the
//! flow controllers stay backend-agnostic.

use crate::errors::StorageError;
use crate::oauth::types::{NewUser, RefreshTokenRecord, User};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving users
#[async_trait]
pub trait UserStore {
    /// Look up a user by internal id; Ok(None) on miss
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Look up a user by provider identity id; Ok(None) on miss
    async fn get_user_by_wikimedia_id(&self, wikimedia_id: &str) -> Result<Option<User>>;

    /// Create a user for a provider identity. Upsert semantics: when a row
    /// already exists for the same `wikimedia_id`, the existing row is
    /// updated in place and returned with its original internal id. Default
    /// role set is `{"user"}` when none given.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Persist updated user attributes (username, email, avatar, last_login)
    async fn update_user(&self, user: &User) -> Result<()>;
}

/// Trait for the refresh token lifecycle
#[async_trait]
pub trait RefreshTokenStore {
    /// Store a newly issued refresh token
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()>;

    /// Retrieve a live refresh token. Ok(None) on miss and also when the
    /// stored row has expired; expiry is checked here, not by callers.
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Revoke a refresh token (logout or rotation)
    async fn delete_refresh_token(&self, token: &str) -> Result<()>;
}

/// Combined storage capability handed to the flow controllers. One
/// implementation is selected at process start; there is no runtime
/// switching.
#[async_trait]
pub trait AuthStorage: UserStore + RefreshTokenStore + Send + Sync {
    /// Idempotently ensure the schema exists. Safe to call on every start.
    async fn initialize(&self) -> Result<()>;
}
