//! Snippet storage.
//!
//! Snippets expire; an expired snippet is never returned. In Redis the record key carries a TTL
//! matching the expiry and `snippets:recent` (a sorted set scored by id) orders them for the
//! home page. Ids whose record has expired are pruned from the set lazily.

use super::RepositoryError;
use crate::models::{now_secs, Snippet};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

const DAY_SECS: u64 = 86_400;

#[async_trait]
pub trait SnippetRepository: Send + Sync {
    /// Store a snippet expiring `expires_days` from now and return its id.
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: u32,
    ) -> Result<i64, RepositoryError>;

    /// Fetch an unexpired snippet.
    async fn get(&self, id: i64) -> Result<Option<Snippet>, RepositoryError>;

    /// Most recently created unexpired snippets, newest first.
    async fn latest(&self, limit: usize) -> Result<Vec<Snippet>, RepositoryError>;
}

fn new_snippet(id: i64, title: &str, content: &str, expires_days: u32) -> Snippet {
    let created_at = now_secs();
    Snippet {
        id,
        title: title.to_string(),
        content: content.to_string(),
        created_at,
        expires_at: created_at + u64::from(expires_days) * DAY_SECS,
    }
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisSnippetRepository {
    con: MultiplexedConnection,
}

impl RedisSnippetRepository {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }
}

#[async_trait]
impl SnippetRepository for RedisSnippetRepository {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: u32,
    ) -> Result<i64, RepositoryError> {
        let mut con = self.con.clone();
        let id: i64 = con.incr("snippets:next_id", 1).await?;
        let snippet = new_snippet(id, title, content, expires_days);
        let json = serde_json::to_string(&snippet)?;

        let ttl_secs = (snippet.expires_at - snippet.created_at).max(1);
        con.set_ex::<_, _, ()>(format!("snippet:{}", id), json, ttl_secs)
            .await?;
        con.zadd::<_, _, _, ()>("snippets:recent", id, id).await?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Snippet>, RepositoryError> {
        let json: Option<String> = self.con.clone().get(format!("snippet:{}", id)).await?;
        match json {
            Some(data) => {
                let snippet: Snippet = serde_json::from_str(&data)?;
                Ok((!snippet.is_expired(now_secs())).then_some(snippet))
            }
            None => Ok(None),
        }
    }

    async fn latest(&self, limit: usize) -> Result<Vec<Snippet>, RepositoryError> {
        let mut con = self.con.clone();
        let mut snippets = Vec::with_capacity(limit);
        let mut start: isize = 0;
        let batch = limit.max(1) as isize;

        while snippets.len() < limit {
            let ids: Vec<i64> = con
                .zrevrange("snippets:recent", start, start + batch - 1)
                .await?;
            if ids.is_empty() {
                break;
            }
            start += batch;

            for id in ids {
                match self.get(id).await? {
                    Some(snippet) => snippets.push(snippet),
                    None => con.zrem::<_, _, ()>("snippets:recent", id).await?,
                }
                if snippets.len() == limit {
                    break;
                }
            }
        }

        Ok(snippets)
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Default)]
struct MemorySnippets {
    next_id: i64,
    snippets: BTreeMap<i64, Snippet>,
}

#[derive(Default)]
pub struct MemorySnippetRepository {
    inner: RwLock<MemorySnippets>,
}

impl MemorySnippetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnippetRepository for MemorySnippetRepository {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: u32,
    ) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .snippets
            .insert(id, new_snippet(id, title, content, expires_days));
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Snippet>, RepositoryError> {
        let now = now_secs();
        Ok(self
            .inner
            .read()
            .await
            .snippets
            .get(&id)
            .filter(|s| !s.is_expired(now))
            .cloned())
    }

    async fn latest(&self, limit: usize) -> Result<Vec<Snippet>, RepositoryError> {
        let now = now_secs();
        Ok(self
            .inner
            .read()
            .await
            .snippets
            .values()
            .rev()
            .filter(|s| !s.is_expired(now))
            .take(limit)
            .cloned()
            .collect())
    }
}
