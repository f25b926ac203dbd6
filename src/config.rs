use std::{env, net::SocketAddr, time::Duration};

use chrono::NaiveDate;
use url::Url;

use crate::error::AppError;

const DEFAULT_WINDOW: &str = "2025-10-27";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub api: ApiConfig,
    pub login: LoginConfig,
    pub poll_interval: Duration,
    /// Views with no request for this long are unmounted.
    pub session_idle: Duration,
}

/// Where trips come from. The credential is the complete `Authorization`
/// header value and never leaves the server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub credential: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

/// The single accepted dashboard login. Plain comparison, no hashing.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub email: String,
    pub password: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            email: "admin@example.com".into(),
            password: "password".into(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-trip-monitor-cookie-secret".to_string());

        let base_url = env::var("TRIP_API_BASE_URL")
            .unwrap_or_else(|_| "https://afc-dev.ainosi.net".to_string());
        let base_url = Url::parse(&base_url)
            .map_err(|err| AppError::Config(format!("invalid TRIP_API_BASE_URL: {err}")))?;

        let credential = env::var("TRIP_API_CREDENTIAL")
            .map_err(|_| AppError::Config("TRIP_API_CREDENTIAL must be set".into()))?;

        let window_start = parse_date_var("TRIP_WINDOW_START")?;
        let window_end = parse_date_var("TRIP_WINDOW_END")?;

        let poll_secs: u64 = env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid POLL_INTERVAL_SECS: {err}")))?;
        if poll_secs == 0 {
            return Err(AppError::Config("POLL_INTERVAL_SECS must be positive".into()));
        }

        let idle_secs: u64 = env::var("SESSION_IDLE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SESSION_IDLE_SECS: {err}")))?;
        if idle_secs < poll_secs {
            return Err(AppError::Config(
                "SESSION_IDLE_SECS must be at least POLL_INTERVAL_SECS".into(),
            ));
        }

        let defaults = LoginConfig::default();
        let login = LoginConfig {
            email: env::var("DASHBOARD_EMAIL").unwrap_or(defaults.email),
            password: env::var("DASHBOARD_PASSWORD").unwrap_or(defaults.password),
        };

        Ok(Self {
            listen_addr,
            cookie_secret,
            api: ApiConfig {
                base_url,
                credential,
                window_start,
                window_end,
            },
            login,
            poll_interval: Duration::from_secs(poll_secs),
            session_idle: Duration::from_secs(idle_secs),
        })
    }
}

fn parse_date_var(name: &str) -> Result<NaiveDate, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| DEFAULT_WINDOW.to_string());
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|err| AppError::Config(format!("invalid {name}: {err}")))
}
