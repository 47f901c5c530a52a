//! Page rendering.
//!
//! Pages are rendered as JSON documents describing what a template would display. The page name
//! identifies the template; the rest is the data a template needs.

use crate::auth::{AuthContext, CsrfToken};
use crate::error::AppError;
use crate::models::{Snippet, User};
use crate::session::{Flash, Session};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub form: Option<serde_json::Value>,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub user: Option<User>,
}

impl TemplateData {
    /// Attach a form (values and errors) for display.
    pub fn with_form<F: Serialize>(mut self, form: &F) -> Result<Self, AppError> {
        self.form = Some(serde_json::to_value(form).map_err(|e| {
            AppError::Internal(format!("form could not be serialized: {}", e))
        })?);
        Ok(self)
    }
}

/// Per-request template defaults. Consumes the pending flash message.
pub fn new_template_data(
    session: &Session,
    auth: AuthContext,
    csrf: &CsrfToken,
) -> Result<TemplateData, AppError> {
    Ok(TemplateData {
        current_year: OffsetDateTime::now_utc().year(),
        flash: session.pop::<Flash>()?,
        is_authenticated: auth.is_authenticated(),
        csrf_token: csrf.0.clone(),
        ..TemplateData::default()
    })
}

#[derive(Serialize)]
struct Page<'a> {
    page: &'a str,
    #[serde(flatten)]
    data: TemplateData,
}

pub fn render(status: StatusCode, page: &str, data: TemplateData) -> Response {
    (status, Json(Page { page, data })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionConfig, SessionStore};
    use crate::storage::MemorySessionBackend;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_template_data_defaults() {
        let store = SessionStore::new(
            Arc::new(MemorySessionBackend::new()),
            SessionConfig {
                lifetime: Duration::from_secs(60),
                cookie_name: "session".to_string(),
                cookie_secure: false,
            },
        );
        let session = store.load(None).await.unwrap();
        session.put::<Flash>("Saved".to_string()).unwrap();

        let data = new_template_data(
            &session,
            AuthContext::default(),
            &CsrfToken("tok".to_string()),
        )
        .unwrap();

        assert_eq!(data.current_year, OffsetDateTime::now_utc().year());
        assert!(data.current_year >= 2024);
        assert_eq!(data.flash.as_deref(), Some("Saved"));
        assert_eq!(data.csrf_token, "tok");
        assert!(!session.exists::<Flash>());
    }

    #[tokio::test]
    async fn test_render_document_shape() {
        let data = TemplateData {
            current_year: 2024,
            flash: Some("Saved".to_string()),
            csrf_token: "tok".to_string(),
            ..TemplateData::default()
        };

        let response = render(StatusCode::UNPROCESSABLE_ENTITY, "home", data);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["page"], "home");
        assert_eq!(json["current_year"], 2024);
        assert_eq!(json["flash"], "Saved");
        assert_eq!(json["is_authenticated"], false);
        assert_eq!(json["csrf_token"], "tok");
        assert!(json["snippets"].as_array().unwrap().is_empty());
    }
}
