//! Interceptors of the standard chain, applied to every route.
//!
//! Order matters: [`RecoverPanic`] goes first so a panic anywhere below it, including in the
//! other interceptors, still produces a response.

use crate::chain::{Interceptor, Next};
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

/// Converts a panic in the rest of the chain into a 500 and closes the connection.
pub struct RecoverPanic;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[async_trait]
impl Interceptor for RecoverPanic {
    async fn intercept(&self, request: Request, next: Next) -> Response {
        let method = request.method().clone();
        let uri = request.uri().clone();

        match AssertUnwindSafe(next.run(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let mut response = AppError::Internal(format!(
                    "panic while handling {} {}: {}",
                    method,
                    uri,
                    panic_message(payload.as_ref())
                ))
                .into_response();
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
                response
            }
        }
    }
}

/// Logs each request with the peer address when the server provides it.
pub struct LogRequest;

#[async_trait]
impl Interceptor for LogRequest {
    async fn intercept(&self, request: Request, next: Next) -> Response {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        tracing::info!(
            remote_addr = %remote_addr,
            proto = ?request.version(),
            method = %request.method(),
            uri = %request.uri(),
            "received request"
        );

        next.run(request).await
    }
}

/// Adds browser hardening headers to every response.
///
/// - **Content-Security-Policy**: same-origin resources, plus Google Fonts stylesheets and fonts
/// - **Referrer-Policy: origin-when-cross-origin**: full URL only for same-origin navigation
/// - **X-Content-Type-Options: nosniff**
/// - **X-Frame-Options: deny**: no framing, against clickjacking
/// - **X-XSS-Protection: 0**: disables the legacy filter, which CSP supersedes
pub struct SecureHeaders;

#[async_trait]
impl Interceptor for SecureHeaders {
    async fn intercept(&self, request: Request, next: Next) -> Response {
        let mut response = next.run(request).await;
        let headers = response.headers_mut();

        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
            ),
        );
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("origin-when-cross-origin"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
        headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));

        response
    }
}
