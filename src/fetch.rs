use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const DEFAULT_API_URL: &str = "https://restcountries.com/v3.1/all";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("{url} returned a malformed payload: {reason}")]
    Payload { url: String, reason: String },
}

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Retrieves the full country dataset from a REST Countries compatible endpoint.
///
/// One GET per call, no retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    url: String,
    http: Client,
}

impl Fetcher {
    pub fn new(url: Option<&str>, timeout_secs: Option<u64>) -> Result<Self, FetchError> {
        let url = url.unwrap_or(DEFAULT_API_URL).trim().to_string();
        let http = Client::builder()
            .user_agent(concat!("country-catalog/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(
                timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_all(&self) -> Result<Vec<Value>, FetchError> {
        info!("fetching country data");
        let resp = self
            .http
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            warn!(%status, "country source returned non-success status");
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
                body,
            });
        }

        let body: Value = resp.json().await.map_err(|e| FetchError::Payload {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        match body {
            Value::Array(records) => {
                info!(count = records.len(), "fetched country records");
                Ok(records)
            }
            other => Err(FetchError::Payload {
                url: self.url.clone(),
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        let fetcher = Fetcher::new(None, Some(5)).unwrap();
        assert_eq!(fetcher.url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = truncate_for_log("ééééé".to_string(), 3);
        assert_eq!(s, "é…");
    }
}
