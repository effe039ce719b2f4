//! PostgreSQL implementation for refresh token storage

use crate::errors::StorageError;
use crate::oauth::types::RefreshTokenRecord;
use crate::storage::traits::{RefreshTokenStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of refresh token storage
pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    /// Create a new PostgreSQL refresh token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to RefreshTokenRecord
    fn row_to_record(row: &PgRow) -> Result<RefreshTokenRecord> {
        Ok(RefreshTokenRecord {
            token: row
                .try_get("token")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get token: {}", e)))?,
            user_id: row.try_get("user_id").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get user_id: {}", e))
            })?,
            expires_at: row.try_get("expires_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get expires_at: {}", e))
            })?,
            user_agent: row.try_get("user_agent").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get user_agent: {}", e))
            })?,
            client_ip: row.try_get("client_ip").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get client_ip: {}", e))
            })?,
            created_at: row.try_get("created_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get created_at: {}", e))
            })?,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn store_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                token, user_id, expires_at, user_agent, client_ip, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.token)
        .bind(&record.user_id)
        .bind(record.expires_at)
        .bind(&record.user_agent)
        .bind(&record.client_ip)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => {
                let record = Self::row_to_record(&row)?;
                // Expired rows read as absent; revocation stays explicit.
                if record.expires_at <= Utc::now() {
                    return Ok(None);
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
