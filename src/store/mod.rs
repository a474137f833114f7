//! Revocable refresh token storage.
//!
//! Records are keyed by the SHA-256 hash of the raw refresh token, never the
//! token itself. A refresh token without a live record is unusable even when
//! its signature and lifetime are still valid.

mod memory;

use async_trait::async_trait;

pub use memory::MemoryTokenStore;

/// A live refresh token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: String,
    /// Unix seconds
    pub created_at: u64,
    /// Unix seconds
    pub expires_at: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// Backend for refresh token records.
///
/// `revoke_all_for_user` is best-effort with respect to rotations running at
/// the same time: a record stored while the sweep runs may survive it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Upsert a record that expires `ttl_secs` from now.
    async fn store(&self, token_hash: &str, user_id: &str, ttl_secs: u64)
    -> Result<(), StoreError>;

    /// Look up a live record. Expired records read as absent.
    async fn check(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Delete one record. Returns whether a record was removed.
    ///
    /// Rotation relies on this being atomic: when several callers revoke the
    /// same hash at once, exactly one of them sees `true`.
    async fn revoke(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Live records owned by `user_id`, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Delete every record owned by `user_id`.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Physically remove expired records.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}
