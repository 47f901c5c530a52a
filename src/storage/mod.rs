//! Persistence collaborators for users, snippets, and sessions.
//!
//! Each concern is a trait with two implementations: Redis for deployments and an in-process
//! map for development and tests. Records are serialized to JSON.
//!
//! Redis key patterns:
//! - `user:{id}` / `user_email:{email}` / `users:next_id`
//! - `snippet:{id}` / `snippets:recent` / `snippets:next_id`
//! - `session:{token}`

pub mod session;
pub mod snippet;
pub mod user;

pub use session::{MemorySessionBackend, RedisSessionBackend, SessionBackend, SessionError};
pub use snippet::{MemorySnippetRepository, RedisSnippetRepository, SnippetRepository};
pub use user::{MemoryUserRepository, RedisUserRepository, UserRepository};

/// Failure reported by a repository.
///
/// Uniqueness conflicts are reported structurally so callers never match on backend error text.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: &'static str },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
