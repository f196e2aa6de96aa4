//! HTTP page scraper.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ScrapeError, ScrapedPage, Scraper};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};

use crate::html::{extract_page, BROWSER_USER_AGENT};

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub timeout: Duration,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Back-off before the first retry; doubles for each later one.
    pub base_delay: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Fetches HTML pages with browser-like headers and extracts their content.
///
/// Redirects are followed; the final URL is reported. 403, 404, 410 and
/// other client errors fail immediately; timeouts, connection errors, 408,
/// 429 and 5xx are retried.
pub struct HttpScraper {
    client: reqwest::Client,
    config: ScraperConfig,
}

impl HttpScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch(&self, url: &str) -> Result<(String, String), ScrapeError> {
        let response = self.client.get(url).send().await.map_err(|e| ScrapeError::Transport {
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Http { status: status.as_u16() });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !(content_type.contains("text/html") || content_type.contains("application/xhtml")) {
            return Err(ScrapeError::UnsupportedContent { content_type });
        }
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| ScrapeError::Transport {
            message: e.to_string(),
        })?;
        Ok((body, final_url))
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError> {
        let mut attempt = 0;
        let (html, final_url) = loop {
            match self.fetch(url).await {
                Ok(fetched) => break fetched,
                Err(error) if error.retry_policy().is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    tracing::warn!(url, attempt = attempt + 1, error = %error, "fetch failed; retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        };

        let page = extract_page(&html, &final_url);
        if page.raw_text.trim().is_empty() {
            return Err(ScrapeError::Empty);
        }
        tracing::info!(url, final_url = %page.final_url, chars = page.raw_text.len(), "page scraped");
        Ok(page)
    }
}
