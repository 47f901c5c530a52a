//! Server-side sessions keyed by an opaque cookie token.
//!
//! [`SessionStore`] is built once at startup and shared by handle. Per request it loads a
//! [`Session`] (or starts an empty one), and afterwards commits it if anything changed. Requests
//! presenting the same token are serialized through a per-token async lock, held by
//! [`LoadAndSave`] for the whole load/use/save cycle.
//!
//! A session's lifetime is absolute: it is fixed when the session is created and survives
//! token renewal.

pub mod keys;
pub mod middleware;

pub use keys::{AuthenticatedUserId, CsrfSecret, Flash, RedirectPathAfterLogin, SessionKey};
pub use middleware::LoadAndSave;

use crate::auth::generate_token;
use crate::error::AppError;
use crate::models::now_secs;
use crate::storage::session::{SessionBackend, SessionError, SessionRecord};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// Cookie and lifetime settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub lifetime: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

type LockTable = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

struct StoreInner {
    backend: Arc<dyn SessionBackend>,
    locks: Mutex<LockTable>,
    config: SessionConfig,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                locks: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.inner.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive use of `token`.
    pub async fn lock(&self, token: &str) -> TokenLock {
        let mutex = self
            .lock_table()
            .entry(token.to_string())
            .or_default()
            .clone();

        TokenLock {
            guard: Some(mutex.lock_owned().await),
            token: token.to_string(),
            store: self.clone(),
        }
    }

    /// Number of tokens with a live lock entry.
    pub fn locked_tokens(&self) -> usize {
        self.lock_table().len()
    }

    /// Resolve `token` to its session, or start an empty one.
    pub async fn load(&self, token: Option<&str>) -> Result<Session, SessionError> {
        let found = match token {
            Some(token) => self
                .inner
                .backend
                .find(token)
                .await?
                .map(|record| (token.to_string(), record)),
            None => None,
        };

        let state = match found {
            Some((token, record)) => SessionState {
                token: Some(token),
                values: record.values,
                expires_at: record.expires_at,
                modified: false,
            },
            None => SessionState {
                token: None,
                values: BTreeMap::new(),
                expires_at: now_secs() + self.inner.config.lifetime.as_secs(),
                modified: false,
            },
        };

        Ok(Session {
            state: Arc::new(Mutex::new(state)),
            backend: self.inner.backend.clone(),
        })
    }

    /// Persist `session` if it changed.
    ///
    /// Returns the token and remaining lifetime in seconds when a cookie must be (re)issued.
    pub async fn save(&self, session: &Session) -> Result<Option<(String, u64)>, SessionError> {
        let (token, record) = {
            let mut state = session.lock_state();
            if !state.modified {
                return Ok(None);
            }
            let token = state.token.get_or_insert_with(generate_token).clone();
            state.modified = false;
            let record = SessionRecord {
                values: state.values.clone(),
                expires_at: state.expires_at,
            };
            (token, record)
        };

        self.inner.backend.commit(&token, &record).await?;
        let remaining = record.expires_at.saturating_sub(now_secs());
        Ok(Some((token, remaining)))
    }

    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        self.inner.backend.purge_expired().await
    }
}

/// Exclusive hold on a session token, released on drop.
pub struct TokenLock {
    guard: Option<OwnedMutexGuard<()>>,
    token: String,
    store: SessionStore,
}

impl Drop for TokenLock {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mut table = self.store.lock_table();
        // Only the table and this guard still reference the mutex: nobody is waiting on it
        if Arc::strong_count(OwnedMutexGuard::mutex(&guard)) <= 2 {
            table.remove(&self.token);
        }
        drop(guard);
    }
}

struct SessionState {
    /// `None` until the session is first saved.
    token: Option<String>,
    values: BTreeMap<String, serde_json::Value>,
    expires_at: u64,
    modified: bool,
}

/// Handle to the current request's session.
///
/// Cloning yields another handle to the same state. Obtain it in handlers as an extractor;
/// [`LoadAndSave`] must be in the chain.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    backend: Arc<dyn SessionBackend>,
}

impl Session {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<K: SessionKey>(&self) -> Result<Option<K::Value>, SessionError> {
        match self.lock_state().values.get(K::NAME) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| SessionError::Decode {
                    key: K::NAME,
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn put<K: SessionKey>(&self, value: K::Value) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.lock_state();
        state.values.insert(K::NAME.to_string(), value);
        state.modified = true;
        Ok(())
    }

    pub fn remove<K: SessionKey>(&self) {
        let mut state = self.lock_state();
        if state.values.remove(K::NAME).is_some() {
            state.modified = true;
        }
    }

    /// Read and delete in one step.
    pub fn pop<K: SessionKey>(&self) -> Result<Option<K::Value>, SessionError> {
        let value = self.get::<K>()?;
        if value.is_some() {
            self.remove::<K>();
        }
        Ok(value)
    }

    pub fn exists<K: SessionKey>(&self) -> bool {
        self.lock_state().values.contains_key(K::NAME)
    }

    /// Move the session to a fresh token.
    ///
    /// The old token stops resolving immediately. The CSRF secret is discarded so a new one is
    /// issued under the new token. Call on every privilege change.
    pub async fn renew_token(&self) -> Result<(), SessionError> {
        let old = {
            let mut state = self.lock_state();
            state.values.remove(CsrfSecret::NAME);
            state.modified = true;
            state.token.replace(generate_token())
        };

        if let Some(old) = old {
            self.backend.delete(&old).await?;
        }
        Ok(())
    }

    /// Current token; `None` for a session that was never saved.
    pub fn token(&self) -> Option<String> {
        self.lock_state().token.clone()
    }

    pub fn is_modified(&self) -> bool {
        self.lock_state().modified
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session requested outside LoadAndSave".to_string()))
    }
}
