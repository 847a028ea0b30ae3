//! Lists places shared by several mount points in a snapshot

use std::path::PathBuf;

use mountpoint_harvester::{errors::HarvesterError, geo::find_duplicate_places, snapshot};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), HarvesterError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        error!("Usage: find_duplicates <snapshot.json>");
        return Err(HarvesterError::ConfigurationError {
            message: "missing snapshot path".to_string(),
        });
    };

    let result = snapshot::read_snapshot(&path).await?;
    info!(
        "Analyzing {} mount points from {}",
        result.streams.len(),
        result.source
    );

    let duplicates = find_duplicate_places(&result.streams);
    for duplicate in &duplicates {
        println!("\n{} ({} streams):", duplicate.place, duplicate.count);
        for name in &duplicate.mount_points {
            if let Some(stream) = result.streams.iter().find(|s| &s.name == name) {
                println!("  - {}: {}, {}", stream.name, stream.latitude, stream.longitude);
            }
        }
    }
    println!("\nTotal duplicate places: {}", duplicates.len());

    Ok(())
}
