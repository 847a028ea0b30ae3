//! Errors for the mount point harvester
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvesterError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("HTTP client error")]
    ClientError(#[from] reqwest::Error),

    #[error("Invalid configuration: {message}")]
    ConfigurationError { message: String },

    #[error("Snapshot write failed for {path}: {origin}")]
    SnapshotWriteError { path: String, origin: String },
}

/// Failure of one transport strategy, or of the whole fetch when every
/// strategy has failed (the last strategy's error is surfaced).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status code {0}")]
    Status(u16),

    #[error("Scheme {0} is not supported in legacy mode")]
    UnsupportedScheme(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection error")]
    Io(#[from] std::io::Error),

    #[error("Legacy fetch timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("No transport strategies configured")]
    NoStrategies,
}

/// Failure of a single reverse geocoding lookup
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geocoder answered with status {0}")]
    Status(u16),

    #[error("Geocoder returned a non-JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}
