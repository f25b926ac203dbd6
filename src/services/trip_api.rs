use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Response,
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    config::ApiConfig,
    error::AppError,
    models::trip::{Trip, TripsEnvelope},
};

const TRIPS_PATH: &str = "/api/v1/transactions/trips";
const FORCE_PAYMENT_PATH: &str = "/api/v1/transactions/force-payment";

/// The remote side of the dashboard: owns all trip and payment state.
#[async_trait]
pub trait TripApi: Send + Sync {
    async fn fetch_trips(&self) -> Result<Vec<Trip>, AppError>;
    async fn force_payment(&self, trip_id: i64) -> Result<Value, AppError>;
}

#[derive(Debug, Clone)]
pub struct HttpTripApi {
    client: Client,
    trips_url: Url,
    force_payment_url: Url,
    credential: String,
}

impl HttpTripApi {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder().build()?;

        let mut trips_url = join(&config.base_url, TRIPS_PATH)?;
        // the endpoint expects a bare `search` flag, so the query is built by hand
        trips_url.set_query(Some(&format!(
            "start_date={}&end_date={}&search",
            config.window_start.format("%Y-%m-%d"),
            config.window_end.format("%Y-%m-%d"),
        )));
        let force_payment_url = join(&config.base_url, FORCE_PAYMENT_PATH)?;

        Ok(Self {
            client,
            trips_url,
            force_payment_url,
            credential: config.credential.clone(),
        })
    }

    pub fn trips_url(&self) -> &Url {
        &self.trips_url
    }

    pub fn force_payment_url(&self, trip_id: i64) -> Url {
        let mut url = self.force_payment_url.clone();
        url.query_pairs_mut()
            .append_pair("trip_id", &trip_id.to_string());
        url
    }

    async fn get(&self, url: Url) -> Result<Response, AppError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.credential)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl TripApi for HttpTripApi {
    async fn fetch_trips(&self) -> Result<Vec<Trip>, AppError> {
        let response = self.get(self.trips_url.clone()).await?;
        let envelope: TripsEnvelope = response.json().await?;
        let trips = envelope.into_trips();
        debug!("fetched {} trips", trips.len());
        Ok(trips)
    }

    async fn force_payment(&self, trip_id: i64) -> Result<Value, AppError> {
        let response = self.get(self.force_payment_url(trip_id)).await?;
        let body: Value = response.json().await?;
        debug!("force payment response for trip {trip_id}: {body}");
        Ok(body)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, AppError> {
    base.join(path)
        .map_err(|err| AppError::Config(format!("invalid API path {path}: {err}")))
}
