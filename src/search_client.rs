// ============================================================================
// File: src/search_client.rs
// SearXNG search client
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use crate::error::TransportError;
use crate::models::{RawSearchRecord, SearXNGResponse};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// A backend that turns query parameters into raw result records
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn query(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<RawSearchRecord>, TransportError>;

    async fn health_check(&self) -> bool;
}

pub struct SearxngClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SearxngClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for SearxngClient {
    async fn query(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<RawSearchRecord>, TransportError> {
        let url = format!("{}/search", self.base_url);

        let mut request = self.client.get(&url).query(params);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let http_response = request.send().await?;

        if !http_response.status().is_success() {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let response_text = http_response.text().await?;

        let response: SearXNGResponse = serde_json::from_str(&response_text).map_err(|e| {
            TransportError::Decode(format!(
                "{} (first 200 chars: {})",
                e,
                response_text.chars().take(200).collect::<String>()
            ))
        })?;

        debug!(url = %url, records = response.results.len(), "SearXNG responded");
        Ok(response.results)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/stats", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                error!(error = %e, "SearXNG health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchUnavailable;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client =
            SearxngClient::new("http://localhost:8080/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn decodes_searxng_payload() {
        let body = r#"{
            "query": "rust",
            "results": [
                { "title": "Rust", "url": "https://www.rust-lang.org", "content": "A language",
                  "engine": "duckduckgo", "score": 1.5, "publishedDate": null },
                { "url": "https://example.com" }
            ]
        }"#;
        let response: SearXNGResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].engine.as_deref(), Some("duckduckgo"));
        assert!(response.results[1].title.is_none());
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let client =
            SearxngClient::new("http://127.0.0.1:1", None, Duration::from_secs(5)).unwrap();
        let params = BTreeMap::from([("q".to_string(), "rust".to_string())]);

        let err = client.query(&params).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)), "{:?}", err);

        let unavailable = SearchUnavailable::from(err);
        assert!(unavailable
            .detail
            .starts_with("Search service unavailable:"));
        assert!(!client.health_check().await);
    }
}
