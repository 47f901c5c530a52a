//! Domain records and the classified outcomes of model operations.
//!
//! Storage records are serialized as JSON by the Redis repositories.

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Newtype for user ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Users
// ============================================================================

/// User data as stored.
///
/// `hashed_password` is a PHC string; it is skipped when a user is handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub hashed_password: String,
    pub created_at: u64,
}

impl User {
    /// Copy without the password hash, for display.
    pub fn redacted(&self) -> Self {
        Self {
            hashed_password: String::new(),
            ..self.clone()
        }
    }
}

/// Fields of a user row before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created_at: u64,
}

// ============================================================================
// Snippets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl Snippet {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Classified outcomes of credential and snippet operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("models: no matching record found")]
    NoRecord,

    #[error("models: invalid credentials")]
    InvalidCredentials,

    #[error("models: duplicate email")]
    DuplicateEmail,

    #[error("models: same password")]
    SamePassword,

    #[error("models: password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Repository(#[from] crate::storage::RepositoryError),
}

/// Seconds since the unix epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
