//! SQLite implementation for user storage

use crate::errors::StorageError;
use crate::oauth::types::{DEFAULT_ROLES, NewUser, User, generate_user_id};
use crate::storage::traits::{Result, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of user storage
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Create a new SQLite user store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
        chrono::DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", column, e)))
    }

    /// Convert SQLite row to User
    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get created_at: {}", e)))?;
        let updated_at_str: String = row
            .try_get("updated_at")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get updated_at: {}", e)))?;
        let last_login_str: Option<String> = row
            .try_get("last_login")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get last_login: {}", e)))?;
        let roles_json: String = row
            .try_get("roles")
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get roles: {}", e)))?;
        let roles: Vec<String> = serde_json::from_str(&roles_json)
            .map_err(|e| StorageError::InvalidData(format!("Invalid roles data: {}", e)))?;

        let last_login = match last_login_str {
            Some(value) => Some(Self::parse_timestamp(&value, "last_login")?),
            None => None,
        };

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
            last_login,
            created_at: Self::parse_timestamp(&created_at_str, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at_str, "updated_at")?,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::row_to_user(&row)).transpose()
    }

    async fn get_user_by_wikimedia_id(&self, wikimedia_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE wikimedia_id = ?")
            .bind(wikimedia_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::row_to_user(&row)).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let now = Utc::now();
        let now_str = now.to_rfc3339();

        // Upsert keyed on the unique wikimedia_id: a concurrent or repeated
        // create must land on the existing row, keeping its internal id.
        let existing = sqlx::query("SELECT id FROM users WHERE wikimedia_id = ?")
            .bind(&new_user.wikimedia_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let user_id = match existing {
            Some(row) => {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| StorageError::DatabaseError(format!("Failed to get id: {}", e)))?;
                sqlx::query(
                    r#"
                    UPDATE users SET
                        username = ?,
                        email = COALESCE(?, email),
                        avatar_url = COALESCE(?, avatar_url),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&new_user.username)
                .bind(&new_user.email)
                .bind(&new_user.avatar_url)
                .bind(&now_str)
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
                id
            }
            None => {
                let id = generate_user_id();
                let roles = new_user
                    .roles
                    .unwrap_or_else(|| DEFAULT_ROLES.iter().map(|r| r.to_string()).collect());
                let roles_json = serde_json::to_string(&roles)
                    .map_err(|e| StorageError::InvalidData(e.to_string()))?;

                sqlx::query(
                    r#"
                    INSERT INTO users (
                        id, username, wikimedia_id, email, avatar_url,
                        roles, last_login, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(&new_user.username)
                .bind(&new_user.wikimedia_id)
                .bind(&new_user.email)
                .bind(&new_user.avatar_url)
                .bind(&roles_json)
                .bind(&now_str)
                .bind(&now_str)
                .bind(&now_str)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
                id
            }
        };

        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        let user = Self::row_to_user(&row)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let roles_json = serde_json::to_string(&user.roles)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let last_login_str = user.last_login.map(|dt| dt.to_rfc3339());
        let now_str = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE users SET
                username = ?,
                email = ?,
                avatar_url = ?,
                roles = ?,
                last_login = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .bind(&roles_json)
        .bind(&last_login_str)
        .bind(&now_str)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
