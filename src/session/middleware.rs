//! Session entry interceptor.

use super::SessionStore;
use crate::chain::{Interceptor, Next};
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};

/// Loads the session named by the request cookie, runs the rest of the chain, then commits the
/// session and issues the cookie if anything changed.
pub struct LoadAndSave {
    store: SessionStore,
}

impl LoadAndSave {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    fn cookie_header(&self, token: String, max_age_secs: u64) -> Option<HeaderValue> {
        let config = self.store.config();
        let cookie = Cookie::build((config.cookie_name.clone(), token))
            .http_only(true)
            .secure(config.cookie_secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(cookie::time::Duration::seconds(
                i64::try_from(max_age_secs).unwrap_or(i64::MAX),
            ))
            .build();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }
}

/// Value of the cookie called `name`, if the request carries one.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl Interceptor for LoadAndSave {
    async fn intercept(&self, mut request: Request, next: Next) -> Response {
        let token = cookie_value(request.headers(), &self.store.config().cookie_name);

        let _lock = match &token {
            Some(token) => Some(self.store.lock(token).await),
            None => None,
        };

        let session = match self.store.load(token.as_deref()).await {
            Ok(session) => session,
            Err(e) => return AppError::from(e).into_response(),
        };
        request.extensions_mut().insert(session.clone());

        let mut response = next.run(request).await;

        let issued = match self.store.save(&session).await {
            Ok(issued) => issued,
            Err(e) => return AppError::from(e).into_response(),
        };

        let headers = response.headers_mut();
        headers.append(header::VARY, HeaderValue::from_static("Cookie"));
        if let Some((token, max_age)) = issued {
            match self.cookie_header(token, max_age) {
                Some(value) => {
                    headers.append(header::SET_COOKIE, value);
                    headers
                        .entry(header::CACHE_CONTROL)
                        .or_insert(HeaderValue::from_static(r#"no-cache="Set-Cookie""#));
                }
                None => {
                    return AppError::Internal("session cookie is not a valid header".to_string())
                        .into_response()
                }
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::session::{Flash, Session, SessionConfig};
    use crate::storage::MemorySessionBackend;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn store() -> SessionStore {
        SessionStore::new(
            Arc::new(MemorySessionBackend::new()),
            SessionConfig {
                lifetime: Duration::from_secs(600),
                cookie_name: "session".to_string(),
                cookie_secure: true,
            },
        )
    }

    fn app(store: SessionStore) -> Router {
        Router::new()
            .route(
                "/put",
                get(|session: Session| async move {
                    session.put::<Flash>("saved".to_string())?;
                    Ok::<_, AppError>("ok")
                }),
            )
            .route(
                "/read",
                get(|session: Session| async move {
                    let flash = session.get::<Flash>()?.unwrap_or_default();
                    Ok::<_, AppError>(flash)
                }),
            )
            .route(
                "/incr",
                get(|session: Session| async move {
                    let count: u32 = session
                        .get::<Flash>()?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or_default();
                    // Widen the window between read and write
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    session.put::<Flash>((count + 1).to_string())?;
                    Ok::<_, AppError>("ok")
                }),
            )
            .layer(Chain::new().with(LoadAndSave::new(store)))
    }

    fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unmodified_session_sets_no_cookie() {
        let response = app(store())
            .oneshot(get_with_cookie("/read", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(response.headers().get(header::VARY).unwrap(), "Cookie");
    }

    #[tokio::test]
    async fn test_modified_session_sets_cookie_and_persists() {
        let store = store();
        let response = app(store.clone())
            .oneshot(get_with_cookie("/put", None))
            .await
            .unwrap();

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Secure"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Path=/"));
        assert!(set_cookie.contains("Max-Age="));

        let pair = set_cookie.split(';').next().unwrap();
        let response = app(store)
            .oneshot(get_with_cookie("/read", Some(pair)))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "saved");
    }

    #[tokio::test]
    async fn test_requests_sharing_a_cookie_are_serialized() {
        let store = store();
        let app = app(store.clone());

        let response = app
            .clone()
            .oneshot(get_with_cookie("/incr", None))
            .await
            .unwrap();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let pair = set_cookie.split(';').next().unwrap();

        let (a, b) = tokio::join!(
            app.clone().oneshot(get_with_cookie("/incr", Some(pair))),
            app.clone().oneshot(get_with_cookie("/incr", Some(pair))),
        );
        assert_eq!(a.unwrap().status(), StatusCode::OK);
        assert_eq!(b.unwrap().status(), StatusCode::OK);

        let response = app
            .oneshot(get_with_cookie("/read", Some(pair)))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, "3");
        assert_eq!(store.locked_tokens(), 0);
    }

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123"),
        );
        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("abc123"));
        assert!(cookie_value(&headers, "missing").is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(cookie_value(&headers, "session").is_none());
    }
}
