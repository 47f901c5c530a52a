//! Route table and middleware chains.
//!
//! Three chains wrap the routes:
//! - standard (every response, including 404s): panic recovery, request logging, headers
//! - dynamic (application pages): session, CSRF, identity
//! - protected: dynamic plus the login gate

pub mod account;
pub mod pages;
pub mod snippet;
pub mod user;

use crate::auth::{AppState, AuthContext, Authenticate, CsrfGuard, RequireAuthentication};
use crate::chain::Chain;
use crate::error::AppError;
use crate::middleware::{LogRequest, RecoverPanic, SecureHeaders};
use crate::models::UserId;
use crate::session::LoadAndSave;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

/// Chain applied to every route.
pub fn standard_chain() -> Chain {
    Chain::new()
        .with(RecoverPanic)
        .with(LogRequest)
        .with(SecureHeaders)
}

/// Chain for pages that use the session.
pub fn dynamic_chain(state: &AppState) -> Chain {
    Chain::new()
        .with(LoadAndSave::new(state.sessions.clone()))
        .with(CsrfGuard::new(state.config.max_form_bytes))
        .with(Authenticate::new(state.credentials.clone()))
}

/// Build the application router.
///
/// Static assets are served from `static_dir` under `/static`.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let dynamic = dynamic_chain(&state);
    let protected = dynamic.append(RequireAuthentication);

    // Chains wrap only the method handlers, so a wrong method is answered 405 by the router
    // before any session is loaded.
    let dynamic_routes = Router::new()
        .route("/", get(pages::home).route_layer(dynamic.clone()))
        .route("/about", get(pages::about).route_layer(dynamic.clone()))
        .route(
            "/snippet/view/{id}",
            get(snippet::view).route_layer(dynamic.clone()),
        )
        .route(
            "/user/signup",
            get(user::signup_form)
                .post(user::signup)
                .route_layer(dynamic.clone()),
        )
        .route(
            "/user/login",
            get(user::login_form)
                .post(user::login)
                .route_layer(dynamic),
        );

    let protected_routes = Router::new()
        .route(
            "/snippet/create",
            get(snippet::create_form)
                .post(snippet::create)
                .route_layer(protected.clone()),
        )
        .route(
            "/user/logout",
            post(user::logout).route_layer(protected.clone()),
        )
        .route(
            "/account/view",
            get(account::view).route_layer(protected.clone()),
        )
        .route(
            "/account/password/update",
            get(account::password_form)
                .post(account::update_password)
                .route_layer(protected),
        );

    Router::new()
        .route("/ping", get(pages::ping))
        .merge(dynamic_routes)
        .merge(protected_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(pages::not_found)
        .layer(standard_chain())
        .with_state(state)
}

/// User id on a route behind [`RequireAuthentication`].
pub(crate) fn signed_in(auth: AuthContext) -> Result<UserId, AppError> {
    auth.user_id
        .ok_or_else(|| AppError::Internal("protected route reached without a user".to_string()))
}
