use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{self, Session},
    error::AppError,
    services::sessions::SessionRegistry,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", post(logout))
}

async fn landing(session: Session) -> Redirect {
    if session.is_authenticated() {
        Redirect::to("/dashboard")
    } else {
        Redirect::to("/login")
    }
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    show_error: bool,
    error_message: String,
    email: String,
}

async fn login_form(session: Session) -> Response {
    if session.is_authenticated() {
        return Redirect::to("/dashboard").into_response();
    }
    AskamaTemplateResponse::into_response(LoginTemplate {
        show_error: false,
        error_message: String::new(),
        email: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate(&state.config.login, &form.email, &form.password) {
        Ok(()) => {
            if let Some(previous) = jar.get(auth::SESSION_COOKIE) {
                state.sessions.unmount(previous.value()).await;
            }
            let view_id = SessionRegistry::new_view_id();
            info!(view = %view_id, "login accepted");
            Ok((
                auth::apply_session_cookie(jar, &view_id),
                Redirect::to("/dashboard"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => {
            info!("login rejected");
            Ok(render_login_error(form.email, auth::LOGIN_FAILED_MESSAGE.into()))
        }
        Err(err) => Err(err),
    }
}

fn render_login_error(email: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            show_error: true,
            error_message: message,
            email,
        }),
    )
        .into_response()
}

async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        state.sessions.unmount(cookie.value()).await;
        info!(view = %cookie.value(), "logged out");
    }
    (auth::clear_session_cookie(jar), Redirect::to("/login"))
}
