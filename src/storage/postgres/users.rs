//! PostgreSQL implementation for user storage

use crate::errors::StorageError;
use crate::oauth::types::{DEFAULT_ROLES, NewUser, User, generate_user_id};
use crate::storage::traits::{Result, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of user storage
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Create a new PostgreSQL user store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to User
    fn row_to_user(row: &PgRow) -> Result<User> {
        let roles_json: String = row
            .try_get("roles")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get roles: {}", e)))?;
        let roles: Vec<String> = serde_json::from_str(&roles_json)
            .map_err(|e| StorageError::InvalidData(format!("Invalid roles data: {}", e)))?;

        Ok(User {
            id: row
                .try_get("id")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get id: {}", e)))?,
            username: row.try_get("username").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get username: {}", e))
            })?,
            wikimedia_id: row.try_get("wikimedia_id").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get wikimedia_id: {}", e))
            })?,
            email: row
                .try_get("email")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get email: {}", e)))?,
            avatar_url: row.try_get("avatar_url").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get avatar_url: {}", e))
            })?,
            roles,
            last_login: row.try_get("last_login").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get last_login: {}", e))
            })?,
            created_at: row.try_get("created_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get created_at: {}", e))
            })?,
            updated_at: row.try_get("updated_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get updated_at: {}", e))
            })?,
        })
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::row_to_user(&row)).transpose()
    }

    async fn get_user_by_wikimedia_id(&self, wikimedia_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE wikimedia_id = $1")
            .bind(wikimedia_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::row_to_user(&row)).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let id = generate_user_id();
        let roles = new_user
            .roles
            .unwrap_or_else(|| DEFAULT_ROLES.iter().map(|r| r.to_string()).collect());
        let roles_json = serde_json::to_string(&roles)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let now = Utc::now();

        // Single-statement upsert: a conflict on the unique wikimedia_id
        // updates the existing row and keeps its internal id.
        let row = sqlx::query(
            r#"
            INSERT INTO users (
                id, username, wikimedia_id, email, avatar_url,
                roles, last_login, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (wikimedia_id) DO UPDATE SET
                username = EXCLUDED.username,
                email = COALESCE(EXCLUDED.email, users.email),
                avatar_url = COALESCE(EXCLUDED.avatar_url, users.avatar_url),
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&new_user.username)
        .bind(&new_user.wikimedia_id)
        .bind(&new_user.email)
        .bind(&new_user.avatar_url)
        .bind(&roles_json)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Self::row_to_user(&row)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let roles_json = serde_json::to_string(&user.roles)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE users SET
                username = $1,
                email = $2,
                avatar_url = $3,
                roles = $4,
                last_login = $5,
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .bind(&roles_json)
        .bind(user.last_login)
        .bind(Utc::now())
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
