//! Mount point harvester

use std::path::Path;

use mountpoint_harvester::{
    config::AppConfig,
    enrich::EnrichmentPipeline,
    errors::HarvesterError,
    geocode::NominatimClient,
    harvest::{HarvestOptions, Harvester},
    snapshot::SnapshotWriter,
    transport::Fetcher,
};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), HarvesterError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Optional config file path, otherwise config/default plus environment
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(Path::new(&path))?,
        None => AppConfig::load()?,
    };
    config.validate()?;

    let client = reqwest::Client::builder()
        .timeout(config.transport.http_timeout)
        .build()?;

    let fetcher = Fetcher::http_then_legacy(client.clone(), config.transport.legacy_timeout);
    let geocoder = NominatimClient::new(
        client,
        &config.geocoder.base_url,
        &config.geocoder.user_agent,
    )?;
    let harvester = Harvester::new(
        fetcher,
        EnrichmentPipeline::new(geocoder, config.geocoder.delay),
        SnapshotWriter::new(&config.harvest.output_dir, &config.harvest.manifest_path),
        HarvestOptions::from(&config),
    );

    // Snapshots are replaced atomically, so an interrupted run keeps the
    // previous files
    tokio::select! {
        result = harvester.run(&config.networks) => {
            let report = result?;
            for failed in &report.failed {
                warn!("Network {} was not harvested: {}", failed.name, failed.error);
            }
            info!(
                "Harvest completed: {} succeeded, {} failed",
                report.succeeded.len(),
                report.failed.len()
            );
        }
        _ = signal::ctrl_c() => {
            error!("Received shutdown signal, harvest aborted");
        }
    }

    Ok(())
}
