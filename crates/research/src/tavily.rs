//! Tavily search API backend.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{SearchBackend, SearchError, SearchHit};
use serde::{Deserialize, Serialize};

pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ResultItem>,
}

#[derive(Deserialize)]
struct ResultItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// Advanced-depth Tavily search. Without an API key every search reports
/// [`SearchError::Unavailable`] so the next backend in the chain is used.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: TAVILY_SEARCH_URL.to_string(),
        })
    }

    /// Points the backend at another endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SearchError::Unavailable {
                reason: "no Tavily API key configured".to_string(),
            });
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest {
                api_key,
                query,
                max_results,
                search_depth: "advanced",
            })
            .send()
            .await
            .map_err(|e| SearchError::Transport { message: e.to_string() })?;
        if !response.status().is_success() {
            return Err(SearchError::Http {
                status: response.status().as_u16(),
            });
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode { message: e.to_string() })?;

        let hits = body
            .results
            .into_iter()
            .filter(|item| !item.url.is_empty())
            .take(max_results)
            .map(|item| SearchHit {
                url: item.url,
                title: item.title,
                snippet: item.content,
                score: item.score,
            })
            .collect::<Vec<_>>();
        tracing::info!(query, count = hits.len(), "tavily search succeeded");
        Ok(hits)
    }
}
