//! Reverse geocoding against a Nominatim compatible service

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::{GeocodeError, HarvesterError};

/// Result of one reverse lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Geocode {
    pub country: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    /// City, else town, else village
    pub city: Option<String>,
    /// Short locality label, `"Unknown"` when the reply has no address
    pub locality: String,
    pub display_name: Option<String>,
    /// Complete response body
    pub raw: Value,
}

/// Reply fields we interpret; everything else stays in `raw`
#[derive(Debug, Default, Deserialize)]
struct Reply {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Address {
    country: Option<String>,
    state: Option<String>,
    county: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    quarter: Option<String>,
    municipality: Option<String>,
}

impl Geocode {
    /// Interpret a geocoder response. Unexpected shapes are treated as a
    /// reply without address data.
    pub fn from_json(raw: Value) -> Self {
        let reply = Reply::deserialize(&raw).unwrap_or_default();
        let locality = locality(&reply);
        let address = reply.address.unwrap_or_default();

        Self {
            country: owned(&address.country),
            state: owned(&address.state),
            county: owned(&address.county),
            city: non_empty(&address.city)
                .or_else(|| non_empty(&address.town))
                .or_else(|| non_empty(&address.village))
                .map(str::to_string),
            locality,
            display_name: owned(&reply.display_name),
            raw,
        }
    }
}

fn locality(reply: &Reply) -> String {
    let Some(address) = &reply.address else {
        return "Unknown".to_string();
    };

    if let Some(city) = non_empty(&address.city) {
        let detail = non_empty(&address.neighbourhood)
            .or_else(|| non_empty(&address.suburb))
            .or_else(|| non_empty(&address.quarter));
        return match detail {
            Some(detail) => format!("{city} ({detail})"),
            None => city.to_string(),
        };
    }

    if let Some(town) = non_empty(&address.town) {
        return town.to_string();
    }

    if let Some(village) = non_empty(&address.village) {
        // Municipality is appended unless the village name already contains it
        return match non_empty(&address.municipality) {
            Some(municipality) if !village.contains(municipality) => {
                format!("{village} ({municipality})")
            }
            _ => village.to_string(),
        };
    }

    non_empty(&reply.name).unwrap_or("Unknown").to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn owned(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

/// Coordinate to place lookup
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Geocode, GeocodeError>;
}

/// Nominatim `reverse` endpoint client
///
/// Performs exactly one request per call. Rate limiting and retries belong to
/// the caller.
pub struct NominatimClient {
    client: reqwest::Client,
    endpoint: Url,
    user_agent: String,
}

impl NominatimClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://nominatim.openstreetmap.org/";
    pub const DEFAULT_USER_AGENT: &'static str = "NearestMountpoint/1.0";

    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        user_agent: &str,
    ) -> Result<Self, HarvesterError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("reverse"))
            .map_err(|e| HarvesterError::ConfigurationError {
                message: format!("Invalid geocoder URL {base_url}: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            user_agent: user_agent.to_string(),
        })
    }

    fn reverse_url(&self, lat: f64, lon: f64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string())
            .append_pair("zoom", "10");
        url
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Geocode, GeocodeError> {
        let url = self.reverse_url(lat, lon);
        debug!("Reverse geocoding {}", url);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let raw: Value = serde_json::from_str(&body)?;
        Ok(Geocode::from_json(raw))
    }
}
