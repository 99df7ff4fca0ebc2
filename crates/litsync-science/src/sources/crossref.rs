use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::CitationSource;

const BASE_URL: &str = "https://api.crossref.org";

/// CrossRef works API. Citation counts come from `is-referenced-by-count`.
pub struct CrossRefSource {
    client: RateLimitedClient,
    base_url: String,
    mailto: Option<String>,
}

impl CrossRefSource {
    pub fn new(mailto: Option<String>) -> Self {
        Self::with_config(BASE_URL.to_string(), mailto, Duration::from_millis(500))
    }

    fn with_config(base_url: String, mailto: Option<String>, min_interval: Duration) -> Self {
        Self {
            client: RateLimitedClient::new(min_interval, 3, "litsync/0.1"),
            base_url,
            mailto,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String) -> Self {
        Self::with_config(base_url, None, Duration::from_millis(1))
    }

    fn work_url(&self, doi: &str) -> String {
        let mut url = format!(
            "{}/works/{}",
            self.base_url,
            urlencoding::encode(doi.trim())
        );
        if let Some(mailto) = self.mailto.as_deref().filter(|m| !m.is_empty()) {
            url.push_str("?mailto=");
            url.push_str(&urlencoding::encode(mailto));
        }
        url
    }
}

#[async_trait]
impl CitationSource for CrossRefSource {
    fn name(&self) -> &'static str {
        "crossref"
    }

    async fn citation_count(&self, doi: &str) -> Result<Option<u64>> {
        let url = self.work_url(doi);
        let Some(body) = self.client.get_optional(&url, HeaderMap::new()).await? else {
            return Ok(None);
        };
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;
        Ok(json
            .get("message")
            .and_then(|m| m.get("is-referenced-by-count"))
            .and_then(Value::as_u64))
    }
}
