//! Application configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::HarvesterError;
use crate::geocode::NominatimClient;
use crate::snapshot::safe_filename;
use crate::transport::{Headers, LegacyStrategy};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Networks to harvest, in harvest order
    #[serde(default)]
    pub networks: Vec<NetworkSource>,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NetworkSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HarvestConfig {
    /// Directory receiving one snapshot per network
    pub output_dir: PathBuf,
    /// Manifest of successfully harvested networks
    pub manifest_path: PathBuf,
    /// Harvest only the network with this name
    pub network: Option<String>,
    /// Do not call the geocoder
    pub skip_places: bool,
    /// Also keep the raw source table next to the snapshot
    pub save_raw: bool,
    /// Keep only the first N streams of each network
    pub stream_limit: Option<usize>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public/mounts"),
            manifest_path: PathBuf::from("public/networks.json"),
            network: None,
            skip_places: false,
            save_raw: false,
            stream_limit: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransportConfig {
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub http_timeout: Duration,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub legacy_timeout: Duration,
    /// Request headers as `Name: value`
    pub headers: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            legacy_timeout: LegacyStrategy::DEFAULT_TIMEOUT,
            headers: vec![
                "Ntrip-Version: Ntrip/2.0".to_string(),
                "User-Agent: NtripCaster/1.0".to_string(),
            ],
        }
    }
}

impl TransportConfig {
    /// Headers split at the first colon; entries without one are ignored
    pub fn request_headers(&self) -> Headers {
        self.headers
            .iter()
            .filter_map(|h| h.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .filter(|(name, _)| !name.is_empty())
            .collect()
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Pause before every lookup
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub delay: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: NominatimClient::DEFAULT_BASE_URL.to_string(),
            user_agent: NominatimClient::DEFAULT_USER_AGENT.to_string(),
            delay: Duration::from_millis(1000),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name("config/default").required(false))
    }

    /// Load from an explicit file, still allowing environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("HARVESTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("transport.headers"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), HarvesterError> {
        self.validate_networks()?;
        self.validate_filter()?;
        self.validate_timeouts()?;
        Ok(())
    }

    fn validate_networks(&self) -> Result<(), HarvesterError> {
        if self.networks.is_empty() {
            return Err(configuration_error("No networks configured"));
        }

        // Snapshot files are keyed by the safe file name, not the raw name
        let mut seen: HashMap<String, &str> = HashMap::new();
        for network in &self.networks {
            if network.name.trim().is_empty() {
                return Err(configuration_error("Network name cannot be empty"));
            }
            let file_name = safe_filename(&network.name);
            if let Some(other) = seen.get(&file_name) {
                return Err(configuration_error(format!(
                    "Networks {} and {} would both be written to {}.json",
                    other, network.name, file_name
                )));
            }
            seen.insert(file_name, network.name.as_str());
            Url::parse(&network.url).map_err(|e| {
                configuration_error(format!(
                    "Invalid URL for network {}: {}",
                    network.name, e
                ))
            })?;
        }
        Ok(())
    }

    fn validate_filter(&self) -> Result<(), HarvesterError> {
        if let Some(name) = &self.harvest.network {
            if !self.networks.iter().any(|n| &n.name == name) {
                return Err(configuration_error(format!("Unknown network: {name}")));
            }
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), HarvesterError> {
        if self.transport.legacy_timeout.is_zero() {
            return Err(configuration_error(
                "Legacy timeout must be greater than zero",
            ));
        }
        if self.transport.http_timeout.is_zero() {
            return Err(configuration_error("HTTP timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn configuration_error(message: impl Into<String>) -> HarvesterError {
    HarvesterError::ConfigurationError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    fn network(name: &str, url: &str) -> NetworkSource {
        NetworkSource {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    fn valid() -> AppConfig {
        AppConfig {
            networks: vec![
                network("ASG-EUPOS", "http://system.asgeupos.pl:8086"),
                network("RTK2go", "http://rtk2go.com:2101"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[[networks]]
name = "ASG-EUPOS"
url = "http://system.asgeupos.pl:8086"

[[networks]]
name = "RTK2go"
url = "http://rtk2go.com:2101"

[harvest]
output_dir = "/tmp/mounts"
skip_places = true
stream_limit = 10

[transport]
legacy_timeout = 2500
headers = ["Ntrip-Version: Ntrip/1.0"]

[geocoder]
delay = 1500
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.networks[1], network("RTK2go", "http://rtk2go.com:2101"));
        assert_eq!(config.harvest.output_dir, PathBuf::from("/tmp/mounts"));
        assert_eq!(
            config.harvest.manifest_path,
            PathBuf::from("public/networks.json")
        );
        assert!(config.harvest.skip_places);
        assert_eq!(config.harvest.stream_limit, Some(10));
        assert_eq!(config.transport.legacy_timeout, Duration::from_millis(2500));
        assert_eq!(config.transport.http_timeout, Duration::from_secs(30));
        assert_eq!(
            config.transport.request_headers(),
            vec![("Ntrip-Version".to_string(), "Ntrip/1.0".to_string())]
        );
        assert_eq!(config.geocoder.delay, Duration::from_millis(1500));
        assert_eq!(config.geocoder.user_agent, "NearestMountpoint/1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_env_override() {
        env::set_var("HARVESTER__GEOCODER__USER_AGENT", "EnvAgent/2.0");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.geocoder.user_agent, "EnvAgent/2.0");

        env::remove_var("HARVESTER__GEOCODER__USER_AGENT");
    }

    #[test]
    fn test_default_headers() {
        let headers = TransportConfig::default().request_headers();
        assert_eq!(
            headers,
            vec![
                ("Ntrip-Version".to_string(), "Ntrip/2.0".to_string()),
                ("User-Agent".to_string(), "NtripCaster/1.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate_empty_networks() {
        assert!(AppConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_names() {
        let mut config = valid();
        config.networks.push(network("RTK2go", "http://other:2101"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_colliding_filenames() {
        let mut config = valid();
        config.networks.push(network("rtk2go", "http://other:2101"));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("RTK2go"), "{err}");
        assert!(err.contains("rtk2go.json"), "{err}");

        let mut config = valid();
        config
            .networks
            .push(network("ASG EUPOS", "http://other:8086"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut config = valid();
        config.networks[0].url = "no scheme here".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_filter() {
        let mut config = valid();
        config.harvest.network = Some("Missing".to_string());
        assert!(config.validate().is_err());

        config.harvest.network = Some("RTK2go".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = valid();
        config.transport.legacy_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
