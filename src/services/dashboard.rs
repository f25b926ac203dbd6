use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{
    sync::{Mutex, RwLock, RwLockReadGuard},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    services::{poller::Poller, trip_api::TripApi},
    view::{Action, Applied, ViewState},
};

pub const FETCH_FALLBACK_ERROR: &str = "Failed to fetch trip data";
pub const FORCE_PAYMENT_OK: &str = "Force Payment berhasil!";
pub const FORCE_PAYMENT_FALLBACK_ERROR: &str = "Gagal melakukan Force Payment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Shows the loading indicator while in flight.
    Loud,
    /// Background refresh, no indicator.
    Silent,
}

impl FetchMode {
    fn is_loud(self) -> bool {
        self == FetchMode::Loud
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
    Failed(String),
    Skipped,
}

/// One viewer's mounted dashboard: its view state, the remote API and the
/// auto-refresh poller.
pub struct DashboardView {
    id: String,
    api: Arc<dyn TripApi>,
    state: RwLock<ViewState>,
    next_seq: AtomicU64,
    poll_interval: Duration,
    poller: Mutex<Option<Poller>>,
    last_seen: std::sync::Mutex<Instant>,
}

impl DashboardView {
    pub fn new(id: impl Into<String>, api: Arc<dyn TripApi>, poll_interval: Duration) -> Self {
        Self {
            id: id.into(),
            api,
            state: RwLock::new(ViewState::default()),
            next_seq: AtomicU64::new(0),
            poll_interval,
            poller: Mutex::new(None),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.state.read().await
    }

    pub async fn dispatch(&self, action: Action) -> Applied {
        self.state.write().await.apply(action)
    }

    /// Records that a viewer request reached this view.
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }

    pub async fn fetch_trips(&self, mode: FetchMode) -> FetchOutcome {
        match self.start_fetch(mode).await {
            Some(seq) => self.finish_fetch(seq, mode).await,
            None => FetchOutcome::Skipped,
        }
    }

    /// Starts a fetch and returns before the API answers. The loading flag
    /// (for loud fetches) is already set when this returns, so a page
    /// rendered right after shows it. `false` when the view is logged out.
    pub async fn spawn_fetch(self: &Arc<Self>, mode: FetchMode) -> bool {
        let Some(seq) = self.start_fetch(mode).await else {
            return false;
        };
        let view = Arc::clone(self);
        tokio::spawn(async move {
            view.finish_fetch(seq, mode).await;
        });
        true
    }

    async fn start_fetch(&self, mode: FetchMode) -> Option<u64> {
        let mut state = self.state.write().await;
        if !state.authenticated {
            return None;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        state.apply(Action::FetchStarted { loud: mode.is_loud() });
        Some(seq)
    }

    async fn finish_fetch(&self, seq: u64, mode: FetchMode) -> FetchOutcome {
        let loud = mode.is_loud();
        let outcome = match self.api.fetch_trips().await {
            Ok(trips) => {
                let count = trips.len();
                let applied = self
                    .dispatch(Action::FetchSucceeded {
                        seq,
                        trips,
                        at: Utc::now(),
                    })
                    .await;
                match applied {
                    Applied::Changed => {
                        debug!(view = %self.id, seq, count, "trip list replaced");
                        FetchOutcome::Applied
                    }
                    Applied::Stale => {
                        debug!(view = %self.id, seq, "dropping stale trip response");
                        FetchOutcome::Stale
                    }
                }
            }
            Err(err) => {
                warn!(view = %self.id, seq, "fetching trips failed: {err}");
                let message = error_message(&err, FETCH_FALLBACK_ERROR);
                match self
                    .dispatch(Action::FetchFailed {
                        seq,
                        message: message.clone(),
                    })
                    .await
                {
                    Applied::Changed => FetchOutcome::Failed(message),
                    Applied::Stale => FetchOutcome::Stale,
                }
            }
        };

        self.dispatch(Action::FetchFinished { loud }).await;
        outcome
    }

    /// Fire-and-forget settlement trigger. Returns the notification text;
    /// the trip list is left alone until the next fetch.
    pub async fn force_payment(&self, trip_id: i64) -> Result<String, String> {
        match self.api.force_payment(trip_id).await {
            Ok(_) => {
                info!(view = %self.id, trip_id, "force payment triggered");
                Ok(FORCE_PAYMENT_OK.to_string())
            }
            Err(err) => {
                warn!(view = %self.id, trip_id, "force payment failed: {err}");
                Err(error_message(&err, FORCE_PAYMENT_FALLBACK_ERROR))
            }
        }
    }

    /// The stored flag and the running poller change together under the
    /// poller slot lock.
    pub async fn set_auto_refresh(self: &Arc<Self>, enabled: bool) {
        let mut slot = self.poller.lock().await;
        let enabled = enabled && self.state.read().await.authenticated;
        self.dispatch(Action::SetAutoRefresh(enabled)).await;

        if let Some(previous) = slot.take() {
            previous.stop();
        }
        if enabled {
            debug!(view = %self.id, "auto-refresh on");
            let view = Arc::downgrade(self);
            *slot = Some(Poller::spawn(self.poll_interval, move || {
                silent_refresh(view.clone())
            }));
        } else {
            debug!(view = %self.id, "auto-refresh off");
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|poller| !poller.is_finished())
    }

    /// Tears the view down: no more polling, and fetches become no-ops.
    pub async fn unmount(&self) {
        let mut slot = self.poller.lock().await;
        if let Some(poller) = slot.take() {
            poller.stop();
        }
        self.dispatch(Action::LoggedOut).await;
    }
}

async fn silent_refresh(view: Weak<DashboardView>) -> bool {
    let Some(view) = view.upgrade() else {
        return false;
    };
    !matches!(view.fetch_trips(FetchMode::Silent).await, FetchOutcome::Skipped)
}

fn error_message(err: &AppError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
