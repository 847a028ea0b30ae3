//! Harvest orchestration
//!
//! One [`Harvester`] owns everything a run needs. Networks are processed one
//! at a time in configuration order; a failed network is reported and the
//! run moves on.

use tracing::{error, info};

use crate::config::{AppConfig, NetworkSource};
use crate::enrich::{apply_fallback_places, EnrichmentPipeline};
use crate::errors::HarvesterError;
use crate::geocode::ReverseGeocoder;
use crate::models::{HarvestResult, ManifestEntry};
use crate::snapshot::{safe_filename, SnapshotWriter};
use crate::sourcetable;
use crate::transport::{Fetcher, Headers};

/// Per-run switches
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    pub headers: Headers,
    pub network: Option<String>,
    pub skip_places: bool,
    pub save_raw: bool,
    pub stream_limit: Option<usize>,
}

impl From<&AppConfig> for HarvestOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            headers: config.transport.request_headers(),
            network: config.harvest.network.clone(),
            skip_places: config.harvest.skip_places,
            save_raw: config.harvest.save_raw,
            stream_limit: config.harvest.stream_limit,
        }
    }
}

/// A network that could not be harvested
#[derive(Debug, Clone, PartialEq)]
pub struct FailedNetwork {
    pub name: String,
    pub error: String,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestReport {
    pub succeeded: Vec<ManifestEntry>,
    pub failed: Vec<FailedNetwork>,
}

pub struct Harvester<G> {
    fetcher: Fetcher,
    pipeline: EnrichmentPipeline<G>,
    writer: SnapshotWriter,
    options: HarvestOptions,
}

impl<G: ReverseGeocoder> Harvester<G> {
    pub fn new(
        fetcher: Fetcher,
        pipeline: EnrichmentPipeline<G>,
        writer: SnapshotWriter,
        options: HarvestOptions,
    ) -> Self {
        Self {
            fetcher,
            pipeline,
            writer,
            options,
        }
    }

    /// Harvest every selected network, then write the manifest of the ones
    /// that succeeded.
    pub async fn run(&self, networks: &[NetworkSource]) -> Result<HarvestReport, HarvesterError> {
        info!("Loading mount points from networks...");
        let mut report = HarvestReport::default();

        let selected = networks.iter().filter(|n| {
            self.options
                .network
                .as_ref()
                .map_or(true, |wanted| &n.name == wanted)
        });

        for network in selected {
            info!("Processing network: {}", network.name);
            match self.harvest_and_store(network).await {
                Ok(entry) => {
                    info!("Completed network: {}", network.name);
                    report.succeeded.push(entry);
                }
                Err(e) => {
                    error!("Failed to process network {}: {}", network.name, e);
                    report.failed.push(FailedNetwork {
                        name: network.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.writer.write_manifest(&report.succeeded).await?;
        Ok(report)
    }

    /// Fetch, parse and enrich one network. Nothing is written except the
    /// raw source table when requested.
    pub async fn harvest(&self, network: &NetworkSource) -> Result<HarvestResult, HarvesterError> {
        let outcome = self
            .fetcher
            .fetch(&network.url, &self.options.headers)
            .await?;

        if self.options.save_raw {
            self.writer
                .write_raw(&safe_filename(&network.name), &outcome.body)
                .await?;
        }

        let table = sourcetable::parse(&outcome.body, &network.name);
        let mut streams = table.streams;

        if let Some(limit) = self.options.stream_limit {
            if streams.len() > limit {
                info!(
                    "Test mode: processing only first {} streams ({} total)",
                    limit,
                    streams.len()
                );
                streams.truncate(limit);
            }
        }

        let streams = if self.options.skip_places {
            info!("Skipping place data fetch");
            apply_fallback_places(&mut streams);
            streams
        } else {
            self.pipeline.enrich(streams).await
        };

        Ok(HarvestResult {
            source: network.name.clone(),
            source_url: network.url.clone(),
            timestamp: outcome.timestamp,
            streams,
            caster: table.caster,
            network: table.network,
        })
    }

    async fn harvest_and_store(
        &self,
        network: &NetworkSource,
    ) -> Result<ManifestEntry, HarvesterError> {
        let result = self.harvest(network).await?;
        let safe_name = safe_filename(&network.name);
        self.writer.write_snapshot(&safe_name, &result).await?;

        Ok(ManifestEntry {
            name: network.name.clone(),
            url: network.url.clone(),
            safe_filename: safe_name,
        })
    }
}
