//! openFDA HTTP client
//!
//! Issues single page requests against the device endpoints. Pagination and
//! the failure policy live in the fetcher; this layer only reports errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::types::{Category, RawRecord};
use crate::config::ApiConfig;

const USER_AGENT: &str = "devreg-sync/0.1";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP error {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Wrapper for the JSON response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawRecord>,
}

/// One page of a search request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub category: Category,
    pub search: Option<&'a str>,
    pub limit: usize,
    pub skip: usize,
}

/// A source of raw device records, one page at a time.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_page(&self, page: PageRequest<'_>) -> Result<Vec<RawRecord>, FetchError>;
}

/// Production record source backed by the public openFDA API
pub struct OpenFdaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenFdaClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Full request URL for one page.
    ///
    /// The search expression keeps its literal `+` separators, which openFDA
    /// reads as spaces.
    pub fn page_url(&self, page: &PageRequest<'_>) -> String {
        let mut url = format!(
            "{}{}?limit={}&skip={}",
            self.base_url,
            page.category.endpoint(),
            page.limit,
            page.skip
        );
        if let Some(search) = page.search {
            url.push_str("&search=");
            url.push_str(&encode_search(search));
        }
        if let Some(key) = &self.api_key {
            url.push_str("&api_key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

#[async_trait]
impl RecordSource for OpenFdaClient {
    async fn fetch_page(&self, page: PageRequest<'_>) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.page_url(&page);
        tracing::debug!(
            "GET {} (category {}, limit {}, skip {})",
            page.category.endpoint(),
            page.category,
            page.limit,
            page.skip
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })?;

        Ok(parsed.results)
    }
}

/// Percent-encode a search expression, keeping `+` as-is.
fn encode_search(search: &str) -> String {
    search
        .split('+')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str) -> OpenFdaClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        };
        OpenFdaClient::new(&config).unwrap()
    }

    #[test]
    fn test_encode_search_keeps_plus() {
        assert_eq!(
            encode_search("decision_date:[2024-01-01+TO+2024-03-31]"),
            "decision_date%3A%5B2024-01-01+TO+2024-03-31%5D"
        );
        assert_eq!(encode_search("applicant:acme"), "applicant%3Aacme");
    }

    #[test]
    fn test_page_url() {
        let client = client_for("https://api.fda.gov/");
        let url = client.page_url(&PageRequest {
            category: Category::Pma,
            search: None,
            limit: 50,
            skip: 0,
        });
        assert_eq!(url, "https://api.fda.gov/device/pma.json?limit=50&skip=0");

        let url = client.page_url(&PageRequest {
            category: Category::K510,
            search: Some("decision_date:[2024-01-01+TO+2024-03-31]"),
            limit: 100,
            skip: 200,
        });
        assert_eq!(
            url,
            "https://api.fda.gov/device/510k.json?limit=100&skip=200\
             &search=decision_date%3A%5B2024-01-01+TO+2024-03-31%5D"
        );
    }

    #[tokio::test]
    async fn test_fetch_page_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device/510k.json"))
            .and(query_param("limit", "2"))
            .and(query_param("skip", "4"))
            .and(query_param("search", "decision_date:[2024-01-01 TO 2024-03-31]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {"results": {"skip": 4, "limit": 2, "total": 6}},
                "results": [{"k_number": "K240001"}, {"k_number": "K240002"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let records = client
            .fetch_page(PageRequest {
                category: Category::K510,
                search: Some("decision_date:[2024-01-01+TO+2024-03-31]"),
                limit: 2,
                skip: 4,
            })
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["k_number"], "K240002");
    }

    #[tokio::test]
    async fn test_fetch_page_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device/pma.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let result = client
            .fetch_page(PageRequest {
                category: Category::Pma,
                search: None,
                limit: 10,
                skip: 0,
            })
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_fetch_page_missing_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/device/pma.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"meta": {}})))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let records = client
            .fetch_page(PageRequest {
                category: Category::Pma,
                search: None,
                limit: 10,
                skip: 0,
            })
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
