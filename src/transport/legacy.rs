//! Legacy NTRIP 1.0 exchange over a raw TCP stream
//!
//! The request is a minimal HTTP/1.0 style request. The response is read until
//! the caster closes the connection and may or may not carry a header block.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{contains_header, timestamp_from_date, FetchOutcome, FetchStrategy, DEFAULT_USER_AGENT};
use crate::errors::FetchError;

const PROTOCOL_TOKEN: &str = "HTTP/1.0";
const HEADER_TERMINATOR: &str = "\r\n\r\n";

/// Raw byte stream fetch, bounded by one overall timeout
#[derive(Debug, Clone)]
pub struct LegacyStrategy {
    timeout: Duration,
}

impl LegacyStrategy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LegacyStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl FetchStrategy for LegacyStrategy {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
    ) -> Result<FetchOutcome, FetchError> {
        if url.scheme() == "https" {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = connect_host(url)
            .ok_or_else(|| FetchError::InvalidUrl(format!("{url}: missing host")))?;
        let port = url.port().unwrap_or(80);

        let request = build_request(url, headers);

        // Dropping the exchange future on expiry closes the socket
        let raw = tokio::time::timeout(self.timeout, exchange(host, port, request.as_bytes()))
            .await
            .map_err(|_| FetchError::Timeout {
                after: self.timeout,
            })??;
        debug!("Legacy exchange with {}:{} read {} bytes", host, port, raw.len());

        let text = decode_binary(&raw);
        let (response_headers, body) = split_response(&text);
        let date = response_headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Date"))
            .map(|(_, value)| value.as_str());

        Ok(FetchOutcome {
            body: body.to_string(),
            timestamp: timestamp_from_date(date),
            strategy: self.name(),
        })
    }
}

async fn exchange(host: &str, port: u16, request: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(request).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    Ok(raw)
}

/// Host to dial; IPv6 literals lose the brackets URLs wrap them in
fn connect_host(url: &Url) -> Option<&str> {
    url.host_str().map(|host| {
        host.strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
    })
}

fn build_request(url: &Url, headers: &[(String, String)]) -> String {
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut request = format!("GET {path}{query} {PROTOCOL_TOKEN}\r\nHost: {host}\r\n");
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Host") {
            continue;
        }
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    if !contains_header(headers, "User-Agent") {
        request.push_str(&format!("User-Agent: {DEFAULT_USER_AGENT}\r\n"));
    }
    if !contains_header(headers, "Accept") {
        request.push_str("Accept: */*\r\n");
    }
    request.push_str("\r\n");
    request
}

/// One char per byte, so undeclared encodings never fail to decode
fn decode_binary(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

/// Split a raw response at the first blank line.
///
/// Returns the parsed header block (name case preserved, value trimmed, split
/// at the first colon) and the body. Without a blank line the whole input is
/// the body and there are no headers.
pub fn split_response(raw: &str) -> (HashMap<String, String>, &str) {
    let Some(end) = raw.find(HEADER_TERMINATOR) else {
        return (HashMap::new(), raw);
    };

    let headers = raw[..end]
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    (headers, &raw[end + HEADER_TERMINATOR.len()..])
}
