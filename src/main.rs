use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use trip_monitor::config::AppConfig;
use trip_monitor::error::AppError;
use trip_monitor::routes::create_router;
use trip_monitor::services::trip_api::HttpTripApi;
use trip_monitor::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let api = HttpTripApi::new(&config.api)?;
    info!("trip source: {}", api.trips_url());

    let state = AppState::new(config.clone(), Arc::new(api));
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,trip_monitor=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
