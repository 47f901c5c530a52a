use super::signed_in;
use crate::auth::{AppState, AuthContext, CsrfToken};
use crate::error::AppError;
use crate::forms::PasswordUpdateForm;
use crate::models::ModelError;
use crate::render::{new_template_data, render};
use crate::session::{Flash, Session};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

/// GET /account/view
pub async fn view(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let id = signed_in(auth)?;

    let user = match state.credentials.get(id).await {
        Ok(user) => user,
        Err(ModelError::NoRecord) => return Ok(Redirect::to("/user/login").into_response()),
        Err(e) => return Err(e.into()),
    };

    let mut data = new_template_data(&session, auth, &csrf)?;
    data.user = Some(user.redacted());
    Ok(render(StatusCode::OK, "account", data))
}

/// GET /account/password/update
pub async fn password_form(
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
) -> Result<Response, AppError> {
    let data =
        new_template_data(&session, auth, &csrf)?.with_form(&PasswordUpdateForm::default())?;
    Ok(render(StatusCode::OK, "password", data))
}

/// POST /account/password/update
pub async fn update_password(
    State(state): State<AppState>,
    session: Session,
    auth: AuthContext,
    csrf: CsrfToken,
    Form(mut form): Form<PasswordUpdateForm>,
) -> Result<Response, AppError> {
    let id = signed_in(auth)?;

    if form.validate() {
        match state
            .credentials
            .update_password(id, &form.current_password, &form.new_password)
            .await
        {
            Ok(()) => {
                session.put::<Flash>("Your password has been updated!".to_string())?;
                return Ok(Redirect::to("/account/view").into_response());
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator
                    .add_field_error("currentPassword", "Current password is incorrect");
            }
            Err(ModelError::SamePassword) => {
                form.validator.add_field_error(
                    "newPassword",
                    "New password must be different from the current password",
                );
            }
            Err(ModelError::NoRecord) => return Ok(Redirect::to("/user/login").into_response()),
            Err(e) => return Err(e.into()),
        }
    }

    let data = new_template_data(&session, auth, &csrf)?.with_form(&form)?;
    Ok(render(StatusCode::UNPROCESSABLE_ENTITY, "password", data))
}
