//! User storage.
//!
//! ## Security: Zeroizing Sensitive Data
//!
//! User records carry password hashes. The Redis implementation wraps the raw JSON it reads in
//! `Zeroizing` so the buffer is cleared once the record is deserialized.

use super::RepositoryError;
use crate::models::{NewUser, User, UserId};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Persistence boundary for user accounts.
///
/// Email uniqueness is enforced here; a conflicting insert reports
/// [`RepositoryError::UniqueViolation`] with `field = "email"`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user and return its id.
    async fn insert(&self, user: NewUser) -> Result<UserId, RepositoryError>;

    /// Id and password hash for the account registered under `email`.
    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserId, String)>, RepositoryError>;

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Replace the stored hash. Returns false if the user does not exist.
    async fn update_password_hash(
        &self,
        id: UserId,
        hashed_password: &str,
    ) -> Result<bool, RepositoryError>;

    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError>;
}

/// Emails are unique regardless of case.
fn email_key(email: &str) -> String {
    format!("user_email:{}", email.trim().to_lowercase())
}

fn user_key(id: UserId) -> String {
    format!("user:{}", id)
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisUserRepository {
    con: MultiplexedConnection,
}

impl RedisUserRepository {
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }

    async fn store(&self, user: &User) -> Result<(), RepositoryError> {
        let json = Zeroizing::new(serde_json::to_string(user)?);
        self.con
            .clone()
            .set::<_, _, ()>(user_key(user.id), json.as_str())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for RedisUserRepository {
    async fn insert(&self, user: NewUser) -> Result<UserId, RepositoryError> {
        let mut con = self.con.clone();
        let id: i64 = con.incr("users:next_id", 1).await?;
        let id = UserId(id);

        // Claim the email first; SET NX is the uniqueness constraint.
        let claimed: Option<String> = redis::cmd("SET")
            .arg(email_key(&user.email))
            .arg(id.0)
            .arg("NX")
            .query_async(&mut con)
            .await?;
        if claimed.is_none() {
            return Err(RepositoryError::UniqueViolation { field: "email" });
        }

        let record = User {
            id,
            name: user.name,
            email: user.email,
            hashed_password: user.hashed_password,
            created_at: user.created_at,
        };
        if let Err(e) = self.store(&record).await {
            let _: Result<(), _> = con.del(email_key(&record.email)).await;
            return Err(e);
        }

        Ok(id)
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserId, String)>, RepositoryError> {
        let id: Option<i64> = self.con.clone().get(email_key(email)).await?;
        match id {
            Some(id) => Ok(self
                .get(UserId(id))
                .await?
                .map(|user| (user.id, user.hashed_password))),
            None => Ok(None),
        }
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let json: Option<String> = self.con.clone().get(user_key(id)).await?;
        match json {
            Some(data) => {
                let data = Zeroizing::new(data);
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        hashed_password: &str,
    ) -> Result<bool, RepositoryError> {
        // Read-modify-write inside Redis so concurrent writers cannot interleave
        let script = redis::Script::new(
            r#"
            local val = redis.call('GET', KEYS[1])
            if not val then
                return 0
            end
            local obj = cjson.decode(val)
            obj.hashed_password = ARGV[1]
            redis.call('SET', KEYS[1], cjson.encode(obj))
            return 1
            "#,
        );

        let updated: i32 = script
            .key(user_key(id))
            .arg(hashed_password)
            .invoke_async(&mut self.con.clone())
            .await?;
        Ok(updated > 0)
    }

    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.con.clone().exists(user_key(id)).await?)
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Default)]
struct MemoryUsers {
    next_id: i64,
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
}

/// In-process user table.
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: RwLock<MemoryUsers>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete an account outright.
    pub async fn remove(&self, id: UserId) -> Option<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.remove(&id)?;
        inner.emails.remove(&email_key(&user.email));
        Some(user)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: NewUser) -> Result<UserId, RepositoryError> {
        let mut inner = self.inner.write().await;
        let key = email_key(&user.email);
        if inner.emails.contains_key(&key) {
            return Err(RepositoryError::UniqueViolation { field: "email" });
        }

        inner.next_id += 1;
        let id = UserId(inner.next_id);
        inner.emails.insert(key, id);
        inner.users.insert(
            id,
            User {
                id,
                name: user.name,
                email: user.email,
                hashed_password: user.hashed_password,
                created_at: user.created_at,
            },
        );
        Ok(id)
    }

    async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<(UserId, String)>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .emails
            .get(&email_key(email))
            .and_then(|id| inner.users.get(id))
            .map(|user| (user.id, user.hashed_password.clone())))
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        hashed_password: &str,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.hashed_password = hashed_password.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.inner.read().await.users.contains_key(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Alice".to_string(),
            email: email.to_string(),
            hashed_password: "hash".to_string(),
            created_at: 1_700_000_000,
        }
    }

    async fn exercise(repo: &dyn UserRepository, email: &str) {
        let id = repo.insert(new_user(email)).await.unwrap();
        assert!(repo.exists(id).await.unwrap());

        let (found, hash) = repo.find_credentials(email).await.unwrap().unwrap();
        assert_eq!(found, id);
        assert_eq!(hash, "hash");

        // Same address in a different case collides
        let err = repo
            .insert(new_user(&email.to_uppercase()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::UniqueViolation { field: "email" }
        ));

        assert!(repo.update_password_hash(id, "hash2").await.unwrap());
        assert_eq!(repo.get(id).await.unwrap().unwrap().hashed_password, "hash2");
    }

    #[tokio::test]
    async fn test_memory_repository() {
        let repo = MemoryUserRepository::new();
        exercise(&repo, "alice@example.com").await;

        assert!(repo.find_credentials("nobody@example.com").await.unwrap().is_none());
        assert!(!repo.exists(UserId(99)).await.unwrap());
        assert!(!repo.update_password_hash(UserId(99), "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_remove() {
        let repo = MemoryUserRepository::new();
        let id = repo.insert(new_user("gone@example.com")).await.unwrap();
        assert!(repo.remove(id).await.is_some());
        assert!(!repo.exists(id).await.unwrap());
        // Email is free again
        repo.insert(new_user("gone@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_repository() {
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

        let email = format!("test-{}@example.com", crate::auth::generate_token());
        let repo = RedisUserRepository::new(con);
        exercise(&repo, &email.to_lowercase()).await;

        assert!(!repo.update_password_hash(UserId(-1), "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_concurrent_password_updates() {
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

        let email = format!("test-{}@example.com", crate::auth::generate_token()).to_lowercase();
        let repo = std::sync::Arc::new(RedisUserRepository::new(con));
        let id = repo.insert(new_user(&email)).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.update_password_hash(id, &format!("hash-{}", n))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        let user = repo.get(id).await.unwrap().unwrap();
        assert!(user.hashed_password.starts_with("hash-"));
        assert_eq!(user.email, email);
        assert_eq!(user.name, "Alice");
        assert_eq!(user.created_at, 1_700_000_000);
    }
}
