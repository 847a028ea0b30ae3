//! Data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use serde_helpers::*;

/// One correction-data mount point published by a caster
///
/// Field order follows the `STR;` record of the source table. `provider`,
/// `location`, `place` and `geocode_raw` are not part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    /// Mount point name, used in the request path when connecting
    pub name: String,
    /// Source identifier, often a city or station code
    pub identifier: String,
    /// Data format, e.g. `RTCM 3.2`
    pub format: String,
    /// Message types and update rates
    pub format_details: String,
    /// Phase information
    ///
    /// - 0 = no phase information
    /// - 1 = L1
    /// - 2 = L1 + L2
    pub carrier: i32,
    /// Navigation systems, e.g. `GPS+GLO+GAL`
    pub nav_system: String,
    /// Network name as declared in the table
    pub network: String,
    /// Three letter country code, may be empty
    pub country: String,
    /// Latitude in WGS84 decimal degrees
    pub latitude: f64,
    /// Longitude in WGS84 decimal degrees
    pub longitude: f64,
    /// 1 if the caster expects an NMEA GGA sentence from the client
    pub nmea: i32,
    /// 0 = single base, 1 = network solution
    pub solution: i32,
    pub generator: String,
    pub encryption: String,
    pub network_transport: String,
    /// `Y` on the wire
    pub has_fees_applied: bool,
    /// Bit rate in bits per second
    pub bitrate: i64,
    pub misc_info: String,
    /// Logical name of the harvested network
    pub provider: String,
    /// Best known location label before enrichment
    pub location: String,
    /// Human readable place, set by enrichment
    pub place: Option<String>,
    /// Full geocoder response, kept for downstream tooling
    pub geocode_raw: Option<Value>,
}

impl Stream {
    /// Place label used when no geocoder data is available
    pub fn fallback_place(&self) -> String {
        format!(
            "{} ({})",
            non_empty_or_unknown(&self.location),
            non_empty_or_unknown(&self.country)
        )
    }
}

/// Caster record (`CAS;`), at most one per source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Caster {
    pub host: String,
    pub port: u16,
    pub identifier: String,
    pub operator: String,
    pub nmea: i32,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub fallback_host: String,
    pub fallback_port: u16,
    pub misc_info: String,
}

/// Network record (`NET;`), at most one per source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub identifier: String,
    pub operator: String,
    /// Authentication mode: `N` none, `B` basic, `D` digest
    pub authentication: String,
    pub has_fees_applied: bool,
    pub website_url: String,
    pub stream_url: String,
    pub registration_url: String,
    pub misc_info: String,
}

/// Snapshot of one harvested network, as written for the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestResult {
    pub source: String,
    pub source_url: String,
    #[serde(
        serialize_with = "serialize_iso8601",
        deserialize_with = "deserialize_iso8601"
    )]
    pub timestamp: DateTime<Utc>,
    pub streams: Vec<Stream>,
    pub caster: Option<Caster>,
    pub network: Option<NetworkInfo>,
}

/// Entry of the successful-networks manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub url: String,
    pub safe_filename: String,
}

fn non_empty_or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "Unknown"
    } else {
        value
    }
}

/// Custom (de)serializers
mod serde_helpers {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize_iso8601<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize_iso8601<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
