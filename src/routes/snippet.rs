use crate::auth::{AppState, AuthContext, CsrfToken};
use crate::error::AppError;
use crate::forms::SnippetCreateForm;
use crate::render::{new_template_data, render};
use crate::session::{Flash, Session};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

/// GET /snippet/view/{id}
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or(AppError::NotFound)?;

    let snippet = state.snippets.get(id).await?.ok_or(AppError::NotFound)?;

    let mut data = new_template_data(&session, auth, &csrf)?;
    data.snippet = Some(snippet);
    Ok(render(StatusCode::OK, "view", data))
}

/// GET /snippet/create
pub async fn create_form(
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let data = new_template_data(&session, auth, &csrf)?.with_form(&SnippetCreateForm::blank())?;
    Ok(render(StatusCode::OK, "create", data))
}

/// POST /snippet/create
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
    Form(mut form): Form<SnippetCreateForm>,
) -> Result<Response, AppError> {
    let Some(expires_days) = form.validate() else {
        let data = new_template_data(&session, auth, &csrf)?.with_form(&form)?;
        return Ok(render(StatusCode::UNPROCESSABLE_ENTITY, "create", data));
    };

    let id = state
        .snippets
        .insert(&form.title, &form.content, expires_days)
        .await?;

    tracing::info!(action = "snippet_created", snippet_id = id, expires_days);
    session.put::<Flash>("Snippet successfully created!".to_string())?;
    Ok(Redirect::to(&format!("/snippet/view/{}", id)).into_response())
}
