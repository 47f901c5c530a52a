use crate::auth::{AppState, AuthContext, CsrfToken};
use crate::error::AppError;
use crate::render::{new_template_data, render};
use crate::session::Session;
use axum::{extract::State, http::StatusCode, response::Response};

const HOME_SNIPPETS: usize = 10;

/// GET /ping
pub async fn ping() -> &'static str {
    "OK"
}

/// GET /
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let mut data = new_template_data(&session, auth, &csrf)?;
    data.snippets = state.snippets.latest(HOME_SNIPPETS).await?;
    Ok(render(StatusCode::OK, "home", data))
}

/// GET /about
pub async fn about(
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let data = new_template_data(&session, auth, &csrf)?;
    Ok(render(StatusCode::OK, "about", data))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
