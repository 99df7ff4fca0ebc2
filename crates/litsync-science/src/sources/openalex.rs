use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::CitationSource;

const BASE_URL: &str = "https://api.openalex.org";

/// OpenAlex works API, addressed by DOI. Citation counts come from
/// `cited_by_count`.
pub struct OpenAlexSource {
    client: RateLimitedClient,
    base_url: String,
}

impl OpenAlexSource {
    pub fn new() -> Self {
        Self::with_config(BASE_URL.to_string(), Duration::from_millis(100))
    }

    fn with_config(base_url: String, min_interval: Duration) -> Self {
        Self {
            client: RateLimitedClient::new(min_interval, 3, "litsync/0.1"),
            base_url,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String) -> Self {
        Self::with_config(base_url, Duration::from_millis(1))
    }
}

impl Default for OpenAlexSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CitationSource for OpenAlexSource {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn citation_count(&self, doi: &str) -> Result<Option<u64>> {
        let url = format!("{}/works/doi:{}", self.base_url, doi.trim().to_lowercase());
        let Some(body) = self.client.get_optional(&url, HeaderMap::new()).await? else {
            return Ok(None);
        };
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;
        Ok(json.get("cited_by_count").and_then(Value::as_u64))
    }
}
