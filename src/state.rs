use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    services::{poller::Poller, sessions::SessionRegistry, trip_api::TripApi},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionRegistry,
    pub cookie_key: Key,
    sweeper: Arc<Poller>,
}

impl AppState {
    /// Must be called inside a tokio runtime: it starts the idle-view sweep,
    /// which lives as long as the last clone of the state.
    pub fn new(config: AppConfig, api: Arc<dyn TripApi>) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        let sessions = SessionRegistry::new(api, config.poll_interval);
        let sweeper = sessions.spawn_sweeper(config.session_idle, config.poll_interval);
        Self {
            config,
            sessions,
            cookie_key,
            sweeper: Arc::new(sweeper),
        }
    }

    pub fn sweeper_running(&self) -> bool {
        !self.sweeper.is_finished()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
