//! Tempest daemon: polls the station and keeps the archive current
//!
//! Each poll fetches one reading, upserts it with its rollups, and logs the
//! derived conditions and ephemeris for the station location.

mod config;
mod scheduler;

use anyhow::{Context, Result};
use tracing::{error, info};

use tempest_core::ReadingSource;
use tempest_db::DbClient;
use tempest_ingest::{AmbientSource, Ingestor, SimulatorSource};

use crate::config::{DaemonConfig, StationSource};
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tempest_obs::init("tempestd");

    let config = DaemonConfig::from_env()?;
    info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        latitude = config.latitude,
        longitude = config.longitude,
        "Loaded configuration"
    );

    let db_client = DbClient::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db_client.ping().await.context("Database ping failed")?;
    db_client.migrate().await.context("Schema migration failed")?;
    info!("Database ready");

    let source: Box<dyn ReadingSource> = match config.source.clone() {
        StationSource::Ambient {
            base_url,
            api_key,
            app_key,
        } => Box::new(AmbientSource::new(base_url, api_key, app_key)?),
        StationSource::Simulator => Box::new(SimulatorSource::default()),
    };
    info!("Station source: {}", source.name());

    let scheduler = Scheduler::new(
        source,
        Ingestor::new(db_client.clone()),
        config.poll_interval,
        config.latitude,
        config.longitude,
    );

    let outcome = tokio::select! {
        result = scheduler.run() => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            signal.context("Failed to listen for shutdown signal")
        }
    };

    if let Err(e) = &outcome {
        error!("Scheduler error: {:#}", e);
    }

    db_client.close().await;
    info!("Tempest daemon stopped");
    outcome
}
