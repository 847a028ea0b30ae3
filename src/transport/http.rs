//! Standard HTTP exchange (NTRIP 2.0 casters)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::DATE, Url};

use super::{merge_headers, timestamp_from_date, FetchOutcome, FetchStrategy, DEFAULT_USER_AGENT};
use crate::errors::FetchError;

/// GET over plain or secure HTTP, success on a 2xx status
#[derive(Clone)]
pub struct HttpStrategy {
    client: reqwest::Client,
    default_headers: Vec<(String, String)>,
}

impl HttpStrategy {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Reuse an existing client and its connection pool
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            default_headers: vec![
                ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ],
        }
    }
}

#[async_trait]
impl FetchStrategy for HttpStrategy {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(
        &self,
        url: &Url,
        headers: &[(String, String)],
    ) -> Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in merge_headers(&self.default_headers, headers) {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let date = response
            .headers()
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        Ok(FetchOutcome {
            body,
            timestamp: timestamp_from_date(date.as_deref()),
            strategy: self.name(),
        })
    }
}
