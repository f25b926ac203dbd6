#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use trip_monitor::{
    config::{ApiConfig, AppConfig, LoginConfig},
    error::AppError,
    models::trip::Trip,
    services::trip_api::TripApi,
};
use url::Url;

/// In-memory stand-in for the remote trip API.
#[derive(Debug, Default)]
pub struct FakeTripApi {
    trips: Mutex<Vec<Trip>>,
    fetch_calls: AtomicUsize,
    forced: Mutex<Vec<i64>>,
    fail_fetch: AtomicBool,
}

impl FakeTripApi {
    pub fn with_trips(trips: Vec<Trip>) -> Self {
        let api = Self::default();
        api.set_trips(trips);
        api
    }

    pub fn set_trips(&self, trips: Vec<Trip>) {
        *self.trips.lock().unwrap() = trips;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn forced(&self) -> Vec<i64> {
        self.forced.lock().unwrap().clone()
    }
}

#[async_trait]
impl TripApi for FakeTripApi {
    async fn fetch_trips(&self) -> Result<Vec<Trip>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamStatus(500));
        }
        Ok(self.trips.lock().unwrap().clone())
    }

    async fn force_payment(&self, trip_id: i64) -> Result<Value, AppError> {
        self.forced.lock().unwrap().push(trip_id);
        Ok(json!({ "message": "queued" }))
    }
}

/// Lets spawned fetches against the fake API run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cookie_secret: "test-cookie-secret".into(),
        api: ApiConfig {
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            credential: "Basic dGVzdDp0ZXN0".into(),
            window_start: NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            window_end: NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
        },
        login: LoginConfig::default(),
        poll_interval: Duration::from_secs(10),
        session_idle: Duration::from_secs(60),
    }
}

/// A trip as the API would send it; `tap_in`/`tap_out` are detail statuses,
/// `None` leaves that detail out.
pub fn trip_json(
    id: i64,
    cpan: &str,
    created_at: &str,
    tap_in: Option<&str>,
    tap_out: Option<&str>,
) -> Value {
    let mut details = Vec::new();
    if let Some(status) = tap_in {
        details.push(json!({
            "id": id * 10 + 1,
            "trip_id": id,
            "group_id": 1,
            "device_id": 100,
            "type": "TAP_IN",
            "amount": 0,
            "status": status,
            "qr_content": "QR-IN",
            "source": "VALIDATOR",
            "source_timestamp": created_at,
            "created_at": created_at,
            "group": { "halte_id": 815, "fleet_id": 0 }
        }));
    }
    if let Some(status) = tap_out {
        details.push(json!({
            "id": id * 10 + 2,
            "trip_id": id,
            "group_id": 2,
            "device_id": 200,
            "type": "TAP_OUT",
            "amount": 3500,
            "status": status,
            "qr_content": "QR-OUT",
            "source": "VALIDATOR",
            "source_timestamp": created_at,
            "created_at": created_at,
            "group": { "halte_id": 0, "fleet_id": 4, "fleet": { "body_code": "TJ-0421" } }
        }));
    }
    json!({
        "id": id,
        "operator_id": 1,
        "user_cpan": cpan,
        "amount": 3500,
        "status": if tap_out == Some("SUCCESS") { "COMPLETE" } else { "PENDING" },
        "created_at": created_at,
        "tap_in_at": created_at,
        "tap_out_at": null,
        "trip_details": details
    })
}

pub fn trip(
    id: i64,
    cpan: &str,
    created_at: &str,
    tap_in: Option<&str>,
    tap_out: Option<&str>,
) -> Trip {
    serde_json::from_value(trip_json(id, cpan, created_at, tap_in, tap_out)).expect("valid trip")
}
