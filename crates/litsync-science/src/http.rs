use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Result, ScienceError};

/// HTTP client that spaces requests by a minimum interval and retries
/// transient failures. 429 responses honor Retry-After; transport errors
/// back off exponentially.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

enum Fetched {
    Body(String),
    NotFound,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        match self.fetch(url, headers).await? {
            Fetched::Body(body) => Ok(body),
            Fetched::NotFound => Err(ScienceError::ApiError(
                url.to_string(),
                "HTTP 404".to_string(),
            )),
        }
    }

    /// Like `get`, but a 404 is data ("this DOI is not indexed here"), not
    /// a failure.
    pub async fn get_optional(&self, url: &str, headers: HeaderMap) -> Result<Option<String>> {
        match self.fetch(url, headers).await? {
            Fetched::Body(body) => Ok(Some(body)),
            Fetched::NotFound => Ok(None),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?;
        serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))
    }

    async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<Fetched> {
        let mut attempt = 0u32;
        loop {
            self.pace().await;
            match self.client.get(url).headers(headers.clone()).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(url.to_string(), 60));
                    }
                    let wait = retry_after_secs(resp.headers()).unwrap_or(60);
                    warn!(url, wait, "rate limited, backing off");
                    sleep(Duration::from_secs(wait)).await;
                }
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    return Ok(Fetched::NotFound);
                }
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {body}"),
                    ));
                }
                Ok(resp) => {
                    return resp.text().await.map(Fetched::Body).map_err(ScienceError::Http);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
            attempt += 1;
        }
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
}
