//! Source table fetching
//!
//! Casters speak either regular HTTP (NTRIP 2.0) or the legacy NTRIP 1.0
//! exchange, which answers `SOURCETABLE 200 OK` and is rejected by HTTP
//! clients. [`Fetcher`] holds an ordered list of [`FetchStrategy`] and returns
//! the first success. Only the last strategy's error reaches the caller.

mod http;
mod legacy;

pub use http::HttpStrategy;
pub use legacy::{split_response, LegacyStrategy};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use tracing::{info, warn};

use crate::errors::FetchError;

/// User-Agent sent when the caller does not supply one
pub const DEFAULT_USER_AGENT: &str = "NTRIP client";

/// Ordered request headers, names compared case-insensitively
pub type Headers = Vec<(String, String)>;

/// Payload of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub body: String,
    /// From the response `Date` header, else capture time
    pub timestamp: DateTime<Utc>,
    /// Name of the strategy that produced the response
    pub strategy: &'static str,
}

/// One way of retrieving a URL
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &Url, headers: &[(String, String)])
        -> Result<FetchOutcome, FetchError>;
}

/// Tries each strategy in order until one succeeds
pub struct Fetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl Fetcher {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// HTTP first, legacy exchange as fallback
    pub fn http_then_legacy(client: reqwest::Client, legacy_timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(HttpStrategy::with_client(client)),
            Box::new(LegacyStrategy::new(legacy_timeout)),
        ])
    }

    pub async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<FetchOutcome, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        info!("Fetching URL: {}", url);

        let mut last_error = FetchError::NoStrategies;
        let mut strategies = self.strategies.iter().peekable();

        while let Some(strategy) = strategies.next() {
            match strategy.fetch(&url, headers).await {
                Ok(outcome) => {
                    info!(
                        "Response received at: {} ({})",
                        outcome.timestamp.to_rfc3339(),
                        outcome.strategy
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    if let Some(next) = strategies.peek() {
                        warn!(
                            "{} fetch failed, trying {}: {}",
                            strategy.name(),
                            next.name(),
                            e
                        );
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Merge `overrides` over `defaults`; an override replaces any default with
/// the same name regardless of case.
pub fn merge_headers(defaults: &[(String, String)], overrides: &[(String, String)]) -> Headers {
    defaults
        .iter()
        .filter(|(name, _)| !contains_header(overrides, name))
        .chain(overrides.iter())
        .cloned()
        .collect()
}

pub(crate) fn contains_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// Obsolete HTTP date forms: RFC 850 and asctime
const LEGACY_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %T GMT", "%a %b %e %T %Y"];

/// Parse an HTTP `Date` header, falling back to the current time
pub(crate) fn timestamp_from_date(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| parse_http_date(v.trim()))
        .unwrap_or_else(Utc::now)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    LEGACY_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// `200 OK` response with a matching Content-Length
    pub fn http_ok(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    /// Serve `response` to `connections` clients in turn, then return the
    /// raw requests received.
    pub async fn serve(
        response: impl AsRef<[u8]>,
        connections: usize,
    ) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let response = response.as_ref().to_vec();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for _ in 0..connections {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                // The client may hang up first when it rejects the reply
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
            requests
        });

        (addr, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
