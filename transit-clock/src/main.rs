use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use transit_clock::config::AppConfig;
use transit_clock::legs::LegRegistry;
use transit_clock::realtime::Feeds;
use transit_clock::refresh::spawn_refresh_task;
use transit_clock::schedule::ScheduleIndex;
use transit_clock::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    info!(path = %config.gtfs_path, "loading static schedule");
    let schedule = Arc::new(ScheduleIndex::load(&config.gtfs_path)?);

    let feeds = match &config.feed_mock_dir {
        Some(dir) => Feeds::mock(dir, config.feed.page_size)?,
        None => Feeds::init(&config.feed)?,
    };

    let legs = LegRegistry::load(&config.legs_file, schedule, &feeds)?;

    // Startup refresh runs in the background; requests before it completes
    // see empty feeds.
    spawn_refresh_task(feeds.clone());

    let state = AppState::new(legs, feeds, config.auth.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "transit clock listening");
    axum::serve(listener, app).await?;
    Ok(())
}
