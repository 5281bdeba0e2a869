//! Periodic purge of expired refresh sessions.
//!
//! Expired rows are already unusable; deleting them only reclaims space, so
//! the sweep is safe to run alongside normal traffic.

use std::sync::Arc;
use std::time::Duration;

use catalog_db::store::SessionStore;
use tokio_util::sync::CancellationToken;

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(sessions: Arc<dyn SessionStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Session cleanup job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match sessions.delete_expired().await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Session cleanup: purged expired sessions");
                    }
                    Ok(_) => tracing::debug!("Session cleanup: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
