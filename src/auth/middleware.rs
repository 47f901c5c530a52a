//! Identity resolution and the login gate.

use super::password::PasswordHasher;
use crate::chain::{Interceptor, Next};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::models::UserId;
use crate::session::{
    AuthenticatedUserId, RedirectPathAfterLogin, Session, SessionConfig, SessionStore,
};
use crate::storage::{SessionBackend, SnippetRepository, UserRepository};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub credentials: CredentialStore,
    pub snippets: Arc<dyn SnippetRepository>,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        snippets: Arc<dyn SnippetRepository>,
        sessions: Arc<dyn SessionBackend>,
        hasher: PasswordHasher,
    ) -> Self {
        let session_config = SessionConfig {
            lifetime: Duration::from_secs(config.session_lifetime_secs),
            cookie_name: config.session_cookie_name.clone(),
            cookie_secure: config.cookie_secure,
        };

        Self {
            config: Arc::new(config),
            sessions: SessionStore::new(sessions, session_config),
            credentials: CredentialStore::new(users, hasher),
            snippets,
        }
    }
}

/// Who is making the request.
///
/// Set by [`Authenticate`]; extracting it on a route without that interceptor yields an
/// anonymous context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Option<UserId>,
}

impl AuthContext {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .unwrap_or_default())
    }
}

fn session_of(request: &Request) -> Result<Session, AppError> {
    request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("authentication requires LoadAndSave".to_string()))
}

/// Resolves the session's user id into an [`AuthContext`].
///
/// A user id whose account no longer exists is dropped from the session and the request
/// continues anonymously.
pub struct Authenticate {
    credentials: CredentialStore,
}

impl Authenticate {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    async fn resolve(&self, session: &Session) -> Result<AuthContext, AppError> {
        let Some(id) = session.get::<AuthenticatedUserId>()? else {
            return Ok(AuthContext::default());
        };

        if self.credentials.exists(id).await? {
            return Ok(AuthContext { user_id: Some(id) });
        }

        tracing::info!(action = "session_user_missing", user_id = %id);
        session.remove::<AuthenticatedUserId>();
        Ok(AuthContext::default())
    }
}

#[async_trait]
impl Interceptor for Authenticate {
    async fn intercept(&self, mut request: Request, next: Next) -> Response {
        let context = match session_of(&request) {
            Ok(session) => self.resolve(&session).await,
            Err(e) => Err(e),
        };

        match context {
            Ok(context) => {
                request.extensions_mut().insert(context);
                next.run(request).await
            }
            Err(e) => e.into_response(),
        }
    }
}

/// Sends anonymous visitors to the login page, remembering where they were going.
///
/// Responses to authenticated users are marked `Cache-Control: no-store`.
pub struct RequireAuthentication;

impl RequireAuthentication {
    fn login_redirect(request: &Request) -> Result<Response, AppError> {
        let session = session_of(request)?;
        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        session.put::<RedirectPathAfterLogin>(path)?;
        Ok(Redirect::to("/user/login").into_response())
    }
}

#[async_trait]
impl Interceptor for RequireAuthentication {
    async fn intercept(&self, request: Request, next: Next) -> Response {
        let authenticated = request
            .extensions()
            .get::<AuthContext>()
            .is_some_and(AuthContext::is_authenticated);

        if !authenticated {
            return Self::login_redirect(&request).unwrap_or_else(IntoResponse::into_response);
        }

        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}
