//! Scheduled cleanup of expired refresh token records.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::store::TokenStore;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run cleanup once.
pub async fn run_cleanup(tokens: &dyn TokenStore) {
    match tokens.purge_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(tokens: Arc<dyn TokenStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(tokens.as_ref()).await;
        }
    })
}
