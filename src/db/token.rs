//! Refresh token records in SQLite.
//!
//! Only refresh tokens are stored, keyed by token hash. Access tokens are
//! stateless and short-lived (15 minutes).

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::jwt::now_secs;
use crate::store::{RefreshTokenRecord, StoreError, TokenStore};

#[derive(sqlx::FromRow)]
struct TokenRow {
    token_hash: String,
    user_id: String,
    created_at: i64,
    expires_at: i64,
}

impl From<TokenRow> for RefreshTokenRecord {
    fn from(row: TokenRow) -> Self {
        Self {
            token_hash: row.token_hash,
            user_id: row.user_id,
            created_at: row.created_at.max(0) as u64,
            expires_at: row.expires_at.max(0) as u64,
        }
    }
}

/// Store for refresh token records backed by the `refresh_tokens` table.
#[derive(Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn store(
        &self,
        token_hash: &str,
        user_id: &str,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let now = current_time()?;
        let expires_at = now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX));

        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(token_hash) DO UPDATE SET user_id = excluded.user_id, created_at = excluded.created_at, expires_at = excluded.expires_at",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn check(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now = current_time()?;
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT token_hash, user_id, created_at, expires_at FROM refresh_tokens WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let now = current_time()?;
        let rows: Vec<TokenRow> = sqlx::query_as(
            "SELECT token_hash, user_id, created_at, expires_at FROM refresh_tokens WHERE user_id = ? AND expires_at > ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = current_time()?;
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn current_time() -> Result<i64, StoreError> {
    let now = now_secs().map_err(|e| StoreError::Unavailable(e.to_string()))?;
    i64::try_from(now).map_err(|e| StoreError::Unavailable(e.to_string()))
}
