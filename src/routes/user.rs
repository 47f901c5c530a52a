use crate::auth::{AppState, AuthContext, CsrfToken};
use crate::error::AppError;
use crate::forms::{UserLoginForm, UserSignupForm};
use crate::models::ModelError;
use crate::render::{new_template_data, render};
use crate::session::{AuthenticatedUserId, Flash, RedirectPathAfterLogin, Session};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

const DEFAULT_LANDING: &str = "/snippet/create";

/// GET /user/signup
pub async fn signup_form(
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let data = new_template_data(&session, auth, &csrf)?.with_form(&UserSignupForm::default())?;
    Ok(render(StatusCode::OK, "signup", data))
}

/// POST /user/signup
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
    Form(mut form): Form<UserSignupForm>,
) -> Result<Response, AppError> {
    if form.validate() {
        match state
            .credentials
            .insert(&form.name, &form.email, &form.password)
            .await
        {
            Ok(_) => {
                session.put::<Flash>("Your signup was successful. Please log in.".to_string())?;
                return Ok(Redirect::to("/user/login").into_response());
            }
            Err(ModelError::DuplicateEmail) => {
                form.validator
                    .add_field_error("email", "Email address is already in use");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let data = new_template_data(&session, auth, &csrf)?.with_form(&form)?;
    Ok(render(StatusCode::UNPROCESSABLE_ENTITY, "signup", data))
}

/// GET /user/login
pub async fn login_form(
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let data = new_template_data(&session, auth, &csrf)?.with_form(&UserLoginForm::default())?;
    Ok(render(StatusCode::OK, "login", data))
}

/// Only same-site absolute paths are followed after login.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

/// POST /user/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
    Form(mut form): Form<UserLoginForm>,
) -> Result<Response, AppError> {
    if form.validate() {
        match state
            .credentials
            .authenticate(&form.email, &form.password)
            .await
        {
            Ok(id) => {
                session.renew_token().await?;
                session.put::<AuthenticatedUserId>(id)?;
                tracing::info!(action = "login", user_id = %id);

                let target = session
                    .pop::<RedirectPathAfterLogin>()?
                    .filter(|path| is_local_path(path))
                    .unwrap_or_else(|| DEFAULT_LANDING.to_string());
                return Ok(Redirect::to(&target).into_response());
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator
                    .add_non_field_error("Email or password is incorrect");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let data = new_template_data(&session, auth, &csrf)?.with_form(&form)?;
    Ok(render(StatusCode::UNPROCESSABLE_ENTITY, "login", data))
}

/// POST /user/logout
pub async fn logout(session: Session, auth: AuthContext) -> Result<Response, AppError> {
    session.renew_token().await?;
    session.remove::<AuthenticatedUserId>();
    session.put::<Flash>("You've been logged out successfully!".to_string())?;

    if let Some(id) = auth.user_id {
        tracing::info!(action = "logout", user_id = %id);
    }
    Ok(Redirect::to("/").into_response())
}
