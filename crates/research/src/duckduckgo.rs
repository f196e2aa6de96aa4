//! Keyless DuckDuckGo HTML search backend.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{SearchBackend, SearchError, SearchHit};
use scraper::{Html, Selector};
use url::Url;

use crate::html::{compact_ws, BROWSER_USER_AGENT};

pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo provides no relevance score; every hit gets this one.
const UNIFORM_SCORE: f64 = 0.5;

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(BROWSER_USER_AGENT)
                .build()?,
            endpoint: DUCKDUCKGO_HTML_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Transport { message: e.to_string() })?;
        if !response.status().is_success() {
            return Err(SearchError::Http {
                status: response.status().as_u16(),
            });
        }
        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Decode { message: e.to_string() })?;

        let hits = parse_results(&html, max_results);
        tracing::info!(query, count = hits.len(), "duckduckgo search succeeded");
        Ok(hits)
    }
}

/// Result links from a DuckDuckGo HTML page, redirect wrappers removed.
fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| compact_ws(&s.text().collect::<String>()))
            .unwrap_or_default();
        hits.push(SearchHit {
            url,
            title: compact_ws(&link.text().collect::<String>()),
            snippet,
            score: UNIFORM_SCORE,
        });
    }
    hits
}

/// Absolute target URL of a result link; DuckDuckGo `/l/?uddg=` redirects
/// are unwrapped.
fn resolve_href(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    let is_redirect = parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) && parsed.path().starts_with("/l/");
    let target = if is_redirect {
        let (_, uddg) = parsed.query_pairs().find(|(k, _)| k == "uddg")?;
        Url::parse(uddg.trim()).ok()?
    } else {
        parsed
    };
    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F&amp;rut=abc">The Rust Book</a>
            <a class="result__snippet">Learn   Rust ownership.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://blog.rust-lang.org/">Rust Blog</a>
          </div>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdoc.rust-lang.org%2Fbook%2F">Duplicate</a>
          </div>
          <div class="result"><a class="result__a" href="javascript:void(0)">Ad</a></div>
        </body></html>"#;

    #[test]
    fn parses_and_unwraps_result_links() {
        let hits = parse_results(PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://doc.rust-lang.org/book/");
        assert_eq!(hits[0].title, "The Rust Book");
        assert_eq!(hits[0].snippet, "Learn Rust ownership.");
        assert_eq!(hits[0].score, 0.5);
        assert_eq!(hits[1].url, "https://blog.rust-lang.org/");
    }

    #[test]
    fn limit_is_respected() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
    }
}
