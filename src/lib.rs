//! Harvester for NTRIP caster source tables
//!
//! Fetches each configured caster's source table (HTTP with a legacy NTRIP 1.0
//! fallback), parses it into typed records, enriches the streams with
//! reverse geocoded place names and writes one JSON snapshot per network.

pub mod config;
pub mod enrich;
pub mod errors;
pub mod geo;
pub mod geocode;
pub mod harvest;
pub mod models;
pub mod snapshot;
pub mod sourcetable;
pub mod transport;
