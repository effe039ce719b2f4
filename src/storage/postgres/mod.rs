//! PostgreSQL storage implementations
//!
//! Suitable for production deployments with shared database state across
//! multiple instances.

mod refresh_tokens;
mod users;

use crate::errors::StorageError;
use crate::oauth::types::{NewUser, RefreshTokenRecord, User};
use crate::storage::traits::{AuthStorage, RefreshTokenStore, Result, UserStore};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::sync::Arc;

pub use refresh_tokens::PostgresRefreshTokenStore;
pub use users::PostgresUserStore;

/// Combined PostgreSQL auth storage implementation
pub struct PostgresAuthStorage {
    pool: PgPool,
    user_store: Arc<PostgresUserStore>,
    refresh_token_store: Arc<PostgresRefreshTokenStore>,
}

impl PostgresAuthStorage {
    /// Create a new PostgreSQL auth storage instance
    pub fn new(pool: PgPool) -> Self {
        let user_store = Arc::new(PostgresUserStore::new(pool.clone()));
        let refresh_token_store = Arc::new(PostgresRefreshTokenStore::new(pool.clone()));

        Self {
            pool,
            user_store,
            refresh_token_store,
        }
    }
}

#[async_trait]
impl UserStore for PostgresAuthStorage {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.user_store.get_user_by_id(id).await
    }

    async fn get_user_by_wikimedia_id(&self, wikimedia_id: &str) -> Result<Option<User>> {
        self.user_store.get_user_by_wikimedia_id(wikimedia_id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.user_store.create_user(new_user).await
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.user_store.update_user(user).await
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresAuthStorage {
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        self.refresh_token_store.store_refresh_token(record).await
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        self.refresh_token_store.get_refresh_token(token).await
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        self.refresh_token_store.delete_refresh_token(token).await
    }
}

#[async_trait]
impl AuthStorage for PostgresAuthStorage {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                wikimedia_id TEXT UNIQUE,
                email TEXT,
                avatar_url TEXT,
                roles TEXT NOT NULL,
                last_login TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Schema creation failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                user_agent TEXT,
                client_ip TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Schema creation failed: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens (user_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Schema creation failed: {}", e)))?;

        Ok(())
    }
}
