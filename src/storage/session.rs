//! Session backends.
//!
//! Redis key pattern:
//! - `session:{token}` - session record (JSON), TTL = remaining lifetime
//!
//! A backend only stores and expires records. Token issuance, renewal and per-token locking
//! live in [`crate::session::SessionStore`].

use crate::models::now_secs;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session value for {key} has the wrong type: {source}")]
    Decode {
        key: &'static str,
        source: serde_json::Error,
    },
}

/// Persisted session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub values: BTreeMap<String, serde_json::Value>,
    /// Absolute expiry, unix seconds.
    pub expires_at: u64,
}

impl SessionRecord {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Record stored under `token`, unless missing or expired.
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Insert or replace the record under `token`.
    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), SessionError>;

    async fn delete(&self, token: &str) -> Result<(), SessionError>;

    /// Drop expired records, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisSessionBackend {
    con: MultiplexedConnection,
}

impl RedisSessionBackend {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let json: Option<String> = self.con.clone().get(session_key(token)).await?;

        match json {
            Some(data) => {
                // Session records hold CSRF secrets; clear the raw buffer after parsing
                let data = Zeroizing::new(data);
                let record: SessionRecord = serde_json::from_str(&data)?;
                Ok((!record.is_expired(now_secs())).then_some(record))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let ttl_secs = record.expires_at.saturating_sub(now_secs());
        if ttl_secs == 0 {
            return self.delete(token).await;
        }

        let json = Zeroizing::new(serde_json::to_string(record)?);
        self.con
            .clone()
            .set_ex::<_, _, ()>(session_key(token), json.as_str(), ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), SessionError> {
        self.con.clone().del::<_, ()>(session_key(token)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        // Redis expires session keys on its own
        Ok(0)
    }
}

// ============================================================================
// Memory
// ============================================================================

/// In-process session table.
#[derive(Default)]
pub struct MemorySessionBackend {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired or not.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let now = now_secs();
        Ok(self
            .records
            .read()
            .await
            .get(token)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn commit(&self, token: &str, record: &SessionRecord) -> Result<(), SessionError> {
        self.records
            .write()
            .await
            .insert(token.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), SessionError> {
        self.records.write().await.remove(token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = now_secs();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: u64) -> SessionRecord {
        let mut values = BTreeMap::new();
        values.insert("flash".to_string(), serde_json::json!("hello"));
        SessionRecord { values, expires_at }
    }

    #[tokio::test]
    async fn test_memory_commit_find_delete() {
        let backend = MemorySessionBackend::new();
        let rec = record(now_secs() + 60);

        backend.commit("tok", &rec).await.unwrap();
        assert_eq!(backend.find("tok").await.unwrap(), Some(rec));

        backend.delete("tok").await.unwrap();
        assert!(backend.find("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_expired_record_not_found() {
        let backend = MemorySessionBackend::new();
        backend.commit("old", &record(now_secs() - 1)).await.unwrap();
        assert!(backend.find("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_purge_expired() {
        let backend = MemorySessionBackend::new();
        backend.commit("old", &record(now_secs() - 1)).await.unwrap();
        backend.commit("new", &record(now_secs() + 60)).await.unwrap();

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.len().await, 1);
        assert!(backend.find("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redis_commit_find_delete() {
        // Note: This test requires a running Redis instance
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let Ok(client) = redis::Client::open(redis_url) else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        let Ok(con) = client.get_multiplexed_async_connection().await else {
            eprintln!("Skipping test: Redis connection failed");
            return;
        };

        let backend = RedisSessionBackend::new(con);
        let token = crate::auth::generate_token();
        let rec = record(now_secs() + 60);

        backend.commit(&token, &rec).await.unwrap();
        assert_eq!(backend.find(&token).await.unwrap(), Some(rec));

        backend.delete(&token).await.unwrap();
        assert!(backend.find(&token).await.unwrap().is_none());
    }
}
