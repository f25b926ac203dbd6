use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::services::{dashboard::DashboardView, poller::Poller, trip_api::TripApi};

/// Mounted dashboards keyed by the id stored in the session cookie.
#[derive(Clone)]
pub struct SessionRegistry {
    views: Arc<DashMap<String, Arc<DashboardView>>>,
    api: Arc<dyn TripApi>,
    poll_interval: Duration,
}

impl SessionRegistry {
    pub fn new(api: Arc<dyn TripApi>, poll_interval: Duration) -> Self {
        Self {
            views: Arc::new(DashMap::new()),
            api,
            poll_interval,
        }
    }

    pub fn new_view_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn get(&self, id: &str) -> Option<Arc<DashboardView>> {
        self.views.get(id).map(|entry| entry.value().clone())
    }

    /// Returns the view for `id`, creating it when this is the first request
    /// seen for that session. The flag is `true` for a freshly mounted view.
    pub fn mount(&self, id: &str) -> (Arc<DashboardView>, bool) {
        let mut fresh = false;
        let view = self
            .views
            .entry(id.to_string())
            .or_insert_with(|| {
                fresh = true;
                Arc::new(DashboardView::new(id, self.api.clone(), self.poll_interval))
            })
            .value()
            .clone();
        if fresh {
            info!(view = %id, "dashboard mounted");
        }
        (view, fresh)
    }

    pub async fn unmount(&self, id: &str) {
        if let Some((_, view)) = self.views.remove(id) {
            view.unmount().await;
            info!(view = %id, "dashboard unmounted");
        }
    }

    /// Unmounts every view no request has reached for `idle_after`.
    /// A view touched between the scan and the removal is kept.
    pub async fn sweep_idle(&self, idle_after: Duration) -> usize {
        let candidates: Vec<String> = self
            .views
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_after)
            .map(|entry| entry.key().clone())
            .collect();

        let mut swept = 0;
        for id in candidates {
            if let Some((_, view)) = self
                .views
                .remove_if(&id, |_, view| view.idle_for() >= idle_after)
            {
                view.unmount().await;
                info!(view = %id, "idle dashboard unmounted");
                swept += 1;
            }
        }
        swept
    }

    /// Background sweep every `period`. Dropping the returned poller stops it.
    pub fn spawn_sweeper(&self, idle_after: Duration, period: Duration) -> Poller {
        let registry = self.clone();
        Poller::spawn(period, move || {
            let registry = registry.clone();
            async move {
                registry.sweep_idle(idle_after).await;
                true
            }
        })
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{error::AppError, models::trip::Trip, view::Action};

    #[derive(Default)]
    struct CountingApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TripApi for CountingApi {
        async fn fetch_trips(&self) -> Result<Vec<Trip>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn force_payment(&self, _trip_id: i64) -> Result<Value, AppError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_recently_seen_views() {
        let registry = SessionRegistry::new(Arc::new(CountingApi::default()), Duration::from_secs(10));
        let (stale, _) = registry.mount("stale");
        stale.dispatch(Action::Authenticated).await;
        let (active, fresh) = registry.mount("active");
        assert!(fresh);

        tokio::time::sleep(Duration::from_secs(45)).await;
        active.touch();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(registry.sweep_idle(Duration::from_secs(60)).await, 1);
        assert!(registry.get("stale").is_none());
        assert!(registry.get("active").is_some());
        assert!(!stale.read().await.authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_polling_of_abandoned_views() {
        let api = Arc::new(CountingApi::default());
        let registry = SessionRegistry::new(api.clone(), Duration::from_secs(10));
        let _sweeper = registry.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(10));

        for id in ["a", "b", "c"] {
            let (view, _) = registry.mount(id);
            view.dispatch(Action::Authenticated).await;
            view.set_auto_refresh(true).await;
        }

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(registry.is_empty());
        let settled = api.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), settled);
        assert!(settled <= 3 * 7);
    }
}
