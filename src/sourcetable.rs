//! NTRIP source table parser
//!
//! A source table is line oriented text. Meaningful lines start with a record
//! tag (`STR;`, `CAS;` or `NET;`) followed by positional fields separated by
//! `;`. Everything else (`ENDSOURCETABLE`, comments, HTTP leftovers) is ignored.
//! Parsing never fails: short or malformed records are skipped and missing
//! fields fall back to empty strings or zero.

use tracing::debug;

use crate::models::{Caster, NetworkInfo, Stream};

const STR_MIN_FIELDS: usize = 11;
const CAS_MIN_FIELDS: usize = 9;
const NET_MIN_FIELDS: usize = 8;

/// Parsed content of one source table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTable {
    pub streams: Vec<Stream>,
    pub caster: Option<Caster>,
    pub network: Option<NetworkInfo>,
}

/// Parse raw source table text, stamping each stream with `provider`.
///
/// If the table holds several `CAS;` or `NET;` records the last one wins.
pub fn parse(raw: &str, provider: &str) -> SourceTable {
    let mut table = SourceTable::default();
    let mut skipped = 0usize;

    for line in raw.split('\n') {
        let line = line.trim_end_matches('\r');

        if line.starts_with("STR;") {
            match parse_stream(line, provider) {
                Some(stream) => table.streams.push(stream),
                None => skipped += 1,
            }
        } else if line.starts_with("CAS;") {
            match parse_caster(line) {
                Some(caster) => table.caster = Some(caster),
                None => skipped += 1,
            }
        } else if line.starts_with("NET;") {
            match parse_network(line) {
                Some(network) => table.network = Some(network),
                None => skipped += 1,
            }
        }
    }

    debug!(
        "Parsed {} streams for {} ({} records skipped)",
        table.streams.len(),
        provider,
        skipped
    );

    table
}

fn parse_stream(line: &str, provider: &str) -> Option<Stream> {
    let f = Fields::split(line);
    if f.len() < STR_MIN_FIELDS {
        return None;
    }

    // (0, 0) means "no fix" and is never a real station
    let latitude = f.float(9)?;
    let longitude = f.float(10)?;
    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }

    let network = f.text(7);
    Some(Stream {
        name: f.text(1),
        identifier: f.text(2),
        format: f.text(3),
        format_details: f.text(4),
        carrier: f.int32(5),
        nav_system: f.text(6),
        location: network.clone(),
        network,
        country: f.text(8),
        latitude,
        longitude,
        nmea: f.int32(11),
        solution: f.int32(12),
        generator: f.text(13),
        encryption: f.text(14),
        network_transport: f.text(15),
        has_fees_applied: f.flag(16),
        bitrate: f.int(17),
        misc_info: f.text(18),
        provider: provider.to_string(),
        place: None,
        geocode_raw: None,
    })
}

fn parse_caster(line: &str) -> Option<Caster> {
    let f = Fields::split(line);
    if f.len() < CAS_MIN_FIELDS {
        return None;
    }

    Some(Caster {
        host: f.text(1),
        port: f.port(2),
        identifier: f.text(3),
        operator: f.text(4),
        nmea: f.int32(5),
        country: f.text(6),
        latitude: f.float(7).unwrap_or(0.0),
        longitude: f.float(8).unwrap_or(0.0),
        fallback_host: f.text(9),
        fallback_port: f.port(10),
        misc_info: f.text(11),
    })
}

fn parse_network(line: &str) -> Option<NetworkInfo> {
    let f = Fields::split(line);
    if f.len() < NET_MIN_FIELDS {
        return None;
    }

    Some(NetworkInfo {
        identifier: f.text(1),
        operator: f.text(2),
        authentication: f.text(3),
        has_fees_applied: f.flag(4),
        website_url: f.text(5),
        stream_url: f.text(6),
        registration_url: f.text(7),
        misc_info: f.text(8),
    })
}

/// Positional view over one record's fields
struct Fields<'a>(Vec<&'a str>);

impl<'a> Fields<'a> {
    fn split(line: &'a str) -> Self {
        Self(line.split(';').collect())
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn text(&self, index: usize) -> String {
        self.0.get(index).map(|s| s.to_string()).unwrap_or_default()
    }

    fn int(&self, index: usize) -> i64 {
        self.0.get(index).and_then(|s| leading_int(s)).unwrap_or(0)
    }

    /// Out of range values fall back to 0
    fn int32(&self, index: usize) -> i32 {
        i32::try_from(self.int(index)).unwrap_or(0)
    }

    fn port(&self, index: usize) -> u16 {
        u16::try_from(self.int(index)).unwrap_or(0)
    }

    /// `None` if the field is missing, non-numeric or not finite
    fn float(&self, index: usize) -> Option<f64> {
        self.0
            .get(index)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    fn flag(&self, index: usize) -> bool {
        self.0.get(index).is_some_and(|s| *s == "Y")
    }
}

/// Parse the leading integer of a field, ignoring trailing garbage
/// (`"9600 bps"` is 9600). Returns `None` when no digits lead.
fn leading_int(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, value.strip_prefix('+').unwrap_or(value)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
