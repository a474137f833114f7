//! In-process token store.
//!
//! Keeps a user id -> token hashes index next to the records so that
//! revoking all of a user's sessions does not scan every record.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{RefreshTokenRecord, StoreError, TokenStore};
use crate::jwt::now_secs;

struct Entry {
    record: RefreshTokenRecord,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Entry>,
    by_user: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn remove(&mut self, token_hash: &str) -> Option<Entry> {
        let entry = self.records.remove(token_hash)?;
        if let Some(hashes) = self.by_user.get_mut(&entry.record.user_id) {
            hashes.remove(token_hash);
            if hashes.is_empty() {
                self.by_user.remove(&entry.record.user_id);
            }
        }
        Some(entry)
    }
}

/// Token store held in memory. Sessions do not survive a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Inner>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, including expired ones not yet purged.
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn store(
        &self,
        token_hash: &str,
        user_id: &str,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let created_at = now_secs().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let record = RefreshTokenRecord {
            token_hash: token_hash.to_string(),
            user_id: user_id.to_string(),
            created_at,
            expires_at: created_at + ttl_secs,
        };
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);

        let mut inner = self.inner.write().await;
        // Upsert: drop any previous owner index entry for this hash.
        inner.remove(token_hash);
        inner
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(token_hash.to_string());
        inner
            .records
            .insert(token_hash.to_string(), Entry { record, deadline });
        Ok(())
    }

    async fn check(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        Ok(inner
            .records
            .get(token_hash)
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.record.clone()))
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.remove(token_hash).is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        let mut records: Vec<RefreshTokenRecord> = inner
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|hash| inner.records.get(hash))
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let hashes = inner.by_user.remove(user_id).unwrap_or_default();
        let mut removed = 0;
        for hash in hashes {
            if inner.records.remove(&hash).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        let expired: Vec<String> = inner
            .records
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(hash, _)| hash.clone())
            .collect();
        for hash in &expired {
            inner.remove(hash);
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_check() {
        let store = MemoryTokenStore::new();
        store.store("hash-1", "user-1", 60).await.unwrap();

        let record = store.check("hash-1").await.unwrap().unwrap();
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.expires_at, record.created_at + 60);

        assert!(store.check("hash-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_makes_record_absent() {
        let store = MemoryTokenStore::new();
        store.store("hash-1", "user-1", 60).await.unwrap();

        assert!(store.revoke("hash-1").await.unwrap());
        assert!(store.check("hash-1").await.unwrap().is_none());
        assert!(!store.revoke("hash-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_one_user() {
        let store = MemoryTokenStore::new();
        store.store("a-1", "alice", 60).await.unwrap();
        store.store("a-2", "alice", 60).await.unwrap();
        store.store("b-1", "bob", 60).await.unwrap();

        assert_eq!(store.revoke_all_for_user("alice").await.unwrap(), 2);

        assert!(store.check("a-1").await.unwrap().is_none());
        assert!(store.check("a-2").await.unwrap().is_none());
        assert!(store.check("b-1").await.unwrap().is_some());
        assert!(store.list_for_user("alice").await.unwrap().is_empty());
        assert_eq!(store.list_for_user("bob").await.unwrap().len(), 1);
        assert_eq!(store.revoke_all_for_user("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_moves_owner_index() {
        let store = MemoryTokenStore::new();
        store.store("hash-1", "alice", 60).await.unwrap();
        store.store("hash-1", "bob", 60).await.unwrap();

        assert_eq!(store.revoke_all_for_user("alice").await.unwrap(), 0);
        let record = store.check("hash-1").await.unwrap().unwrap();
        assert_eq!(record.user_id, "bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_expire_after_ttl() {
        let store = MemoryTokenStore::new();
        store.store("short", "user-1", 10).await.unwrap();
        store.store("long", "user-1", 100).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(store.check("short").await.unwrap().is_none());
        assert!(store.check("long").await.unwrap().is_some());

        assert_eq!(store.len().await, 2);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}
