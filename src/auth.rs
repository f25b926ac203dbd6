use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};

use crate::{config::LoginConfig, error::AppError};

/// Private cookie whose presence is the "logged in" flag. Its value names the
/// viewer's mounted dashboard.
pub const SESSION_COOKIE: &str = "trip_session";

pub const LOGIN_FAILED_MESSAGE: &str = "Email atau password salah";

#[derive(Debug, Clone, Default)]
pub struct Session(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        let view_id = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());
        Ok(Self(view_id))
    }
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn require_view_id(&self) -> Result<&str, AppError> {
        self.0.as_deref().ok_or(AppError::Unauthorized)
    }
}

/// Hardcoded single-account check; there is no user store behind it.
pub fn authenticate(login: &LoginConfig, email: &str, password: &str) -> Result<(), AppError> {
    if email == login.email && password == login.password {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub fn apply_session_cookie(jar: PrivateCookieJar, view_id: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, view_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_configured_pair_is_accepted() {
        let login = LoginConfig::default();
        assert!(authenticate(&login, "admin@example.com", "password").is_ok());
        assert!(authenticate(&login, "admin@example.com", "Password").is_err());
        assert!(authenticate(&login, "Admin@example.com", "password").is_err());
        assert!(authenticate(&login, "", "").is_err());
    }

    #[test]
    fn anonymous_session_is_rejected() {
        assert!(Session::default().require_view_id().is_err());
        let session = Session(Some("abc".into()));
        assert!(session.is_authenticated());
        assert_eq!(session.require_view_id().ok(), Some("abc"));
    }
}
