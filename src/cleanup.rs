//! Background purge of expired sessions.
//!
//! Expired sessions are never served, but an in-process backend keeps them in memory until
//! they are removed. Redis expires session keys itself, so each pass is a no-op there.

use crate::session::SessionStore;
use crate::storage::SessionError;
use std::time::Duration;

/// Run the cleanup loop.
///
/// Purges expired sessions every `interval`. Never returns.
pub async fn run_cleanup_loop(sessions: SessionStore, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        if let Err(e) = purge_expired_sessions(&sessions).await {
            tracing::error!(error = %e, "Cleanup job failed");
        }
    }
}

/// One cleanup pass. Returns the number of sessions removed.
pub async fn purge_expired_sessions(sessions: &SessionStore) -> Result<usize, SessionError> {
    let removed = sessions.purge_expired().await?;
    if removed > 0 {
        tracing::info!(removed, "Cleanup job completed");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now_secs;
    use crate::session::SessionConfig;
    use crate::storage::session::SessionRecord;
    use crate::storage::{MemorySessionBackend, SessionBackend};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let backend = Arc::new(MemorySessionBackend::new());
        let sessions = SessionStore::new(
            backend.clone(),
            SessionConfig {
                lifetime: Duration::from_secs(60),
                cookie_name: "session".to_string(),
                cookie_secure: false,
            },
        );

        let expired = SessionRecord {
            expires_at: now_secs() - 1,
            ..SessionRecord::default()
        };
        let live = SessionRecord {
            expires_at: now_secs() + 60,
            ..SessionRecord::default()
        };
        backend.commit("expired", &expired).await.unwrap();
        backend.commit("live", &live).await.unwrap();

        assert_eq!(purge_expired_sessions(&sessions).await.unwrap(), 1);
        assert_eq!(purge_expired_sessions(&sessions).await.unwrap(), 0);
        assert_eq!(backend.len().await, 1);
    }
}
