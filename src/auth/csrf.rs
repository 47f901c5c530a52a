//! Cross-site request forgery protection.
//!
//! A session gets a random secret the first time a page asks for one through the [`CsrfToken`]
//! extractor, so requests that never render a form leave no session behind. Pages echo it back in a hidden `csrf_token` field (or an `X-CSRF-Token` header for scripted
//! clients). State-changing requests whose token does not match are rejected with 400 before
//! any handler runs.

use super::token::{generate_token, tokens_match};
use crate::chain::{Interceptor, Next};
use crate::error::AppError;
use crate::session::{CsrfSecret, Session};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The current session's CSRF secret, for embedding in forms.
///
/// Extracting it issues a secret if the session has none yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("CSRF token requested outside LoadAndSave".to_string()))?;
        secret_for(session).map(CsrfToken)
    }
}

#[derive(Deserialize)]
struct CsrfForm {
    csrf_token: Option<String>,
}

/// Runs after [`crate::session::LoadAndSave`]. Buffers form bodies up to `max_body_bytes` to read
/// the submitted token, then hands the body on unchanged.
pub struct CsrfGuard {
    max_body_bytes: usize,
}

impl CsrfGuard {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// False when an `Origin` header names a different host than `Host`.
fn same_origin(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    origin
        .to_str()
        .ok()
        .and_then(|origin| origin.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_ascii_lowercase()))
        .is_some_and(|authority| authority == host.to_ascii_lowercase())
}

fn secret_for(session: &Session) -> Result<String, AppError> {
    if let Some(secret) = session.get::<CsrfSecret>()? {
        return Ok(secret);
    }
    let secret = generate_token();
    session.put::<CsrfSecret>(secret.clone())?;
    Ok(secret)
}

impl CsrfGuard {
    async fn check(&self, request: Request) -> Result<Request, AppError> {
        if is_safe(request.method()) {
            return Ok(request);
        }

        let session = request
            .extensions()
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("CsrfGuard requires LoadAndSave".to_string()))?;
        let secret = session.get::<CsrfSecret>()?;

        self.verify(request, secret.as_deref()).await
    }

    /// A session without a secret never issued a form, so nothing it submits can match.
    async fn verify(&self, request: Request, secret: Option<&str>) -> Result<Request, AppError> {
        if !same_origin(request.headers()) {
            tracing::warn!(action = "csrf_rejected", reason = "origin mismatch");
            return Err(AppError::BadRequest("Cross-origin request refused".to_string()));
        }

        let header_token = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (request, submitted) = match header_token {
            Some(token) => (request, Some(token)),
            None if is_form(request.headers()) => {
                let (parts, body) = request.into_parts();
                let bytes = axum::body::to_bytes(body, self.max_body_bytes)
                    .await
                    .map_err(|_| AppError::BadRequest("Request body too large".to_string()))?;
                let submitted = serde_urlencoded::from_bytes::<CsrfForm>(&bytes)
                    .ok()
                    .and_then(|form| form.csrf_token);
                (Request::from_parts(parts, Body::from(bytes)), submitted)
            }
            None => (request, None),
        };

        match submitted {
            Some(token) if secret.is_some_and(|secret| tokens_match(&token, secret)) => Ok(request),
            _ => {
                tracing::warn!(
                    action = "csrf_rejected",
                    method = %request.method(),
                    uri = %request.uri(),
                    "missing or invalid CSRF token"
                );
                Err(AppError::BadRequest("Invalid CSRF token".to_string()))
            }
        }
    }
}

#[async_trait]
impl Interceptor for CsrfGuard {
    async fn intercept(&self, request: Request, next: Next) -> Response {
        match self.check(request).await {
            Ok(request) => next.run(request).await,
            Err(e) => e.into_response(),
        }
    }
}
