use std::sync::Arc;
use tracing::info;

use volunteer_finder::{api, config::Settings, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env();
    let port = settings.port;

    info!("Starting volunteer-finder");
    info!(sources = ?settings.enabled_sources, "configured sources");
    info!("Geocoder: {}", settings.nominatim_url);

    let state = Arc::new(AppState::from_settings(settings)?);
    let sweeper = state.cache.clone().spawn_sweeper();

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("volunteer-finder listening on http://{}", addr);

    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
