use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::CitationSource;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Semantic Scholar Graph API. Citation counts come from `citationCount`.
pub struct SemanticScholarSource {
    client: RateLimitedClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>) -> Self {
        // The anonymous pool is throttled far harder than keyed access.
        let min_interval = if api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        Self::with_config(BASE_URL.to_string(), api_key, min_interval)
    }

    fn with_config(base_url: String, api_key: Option<String>, min_interval: Duration) -> Self {
        Self {
            client: RateLimitedClient::new(min_interval, 3, "litsync/0.1"),
            base_url,
            api_key,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String) -> Self {
        Self::with_config(base_url, None, Duration::from_millis(1))
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            let value =
                HeaderValue::from_str(key).map_err(|e| ScienceError::Parse(e.to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl CitationSource for SemanticScholarSource {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn citation_count(&self, doi: &str) -> Result<Option<u64>> {
        let url = format!(
            "{}/paper/DOI:{}?fields=citationCount",
            self.base_url,
            doi.trim()
        );
        let Some(body) = self.client.get_optional(&url, self.auth_headers()?).await? else {
            return Ok(None);
        };
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;
        Ok(json.get("citationCount").and_then(Value::as_u64))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;

    #[tokio::test]
    async fn reads_citation_count() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/paper/DOI:10.1000/xyz?fields=citationCount")
            .with_status(200)
            .with_body(r#"{"paperId": "abc", "citationCount": 512}"#)
            .create_async()
            .await;

        let source = SemanticScholarSource::new_for_tests(server.url());
        assert_eq!(
            source.citation_count("10.1000/xyz").await.unwrap(),
            Some(512)
        );
    }

    #[tokio::test]
    async fn server_error_is_an_error_not_null() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/paper/DOI:10.1000/xyz?fields=citationCount")
            .with_status(500)
            .create_async()
            .await;

        let source = SemanticScholarSource::new_for_tests(server.url());
        assert!(source.citation_count("10.1000/xyz").await.is_err());
    }
}
