//! Source harvesting: multi-query search across a fallback chain of backends,
//! bounded concurrent scraping, de-duplication and ranking.
//!
//! Both fan-outs use `buffered(n)`, so at most `n` requests are in flight and
//! results come back in submission order regardless of completion order.
//! Individual failures are logged and omitted.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use pipeline::source::{canonical_url, deduplicate_sources, rank_sources};
use pipeline::{Outline, Scraper, SearchBackend, SearchHit, Source, Timestamp};

/// Result of one harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    /// Ranked, de-duplicated sources, best first, at most the requested count.
    pub sources: Vec<Source>,
    /// Pages that were fetched successfully before selection.
    pub total_candidates: usize,
}

/// Limits for one harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestLimits {
    pub max_search_results: usize,
    pub max_sources: usize,
    pub search_concurrency: usize,
    pub scrape_concurrency: usize,
}

/// Runs `query` against each backend in priority order and returns the first
/// non-empty result.
pub async fn search_with_fallback(
    backends: &[Arc<dyn SearchBackend>],
    query: &str,
    max_results: usize,
) -> Vec<SearchHit> {
    for backend in backends {
        match backend.search(query, max_results).await {
            Ok(hits) if !hits.is_empty() => {
                tracing::debug!(backend = backend.name(), query, count = hits.len(), "search succeeded");
                return hits;
            }
            Ok(_) => tracing::debug!(backend = backend.name(), query, "search returned no results"),
            Err(error) => tracing::warn!(backend = backend.name(), query, %error, "search failed"),
        }
    }
    Vec::new()
}

/// Searches every query and returns hits with unique canonical URLs, in query
/// order.
pub async fn multi_query_search(
    backends: &[Arc<dyn SearchBackend>],
    queries: &[String],
    per_query: usize,
    concurrency: usize,
) -> Vec<SearchHit> {
    let batches: Vec<Vec<SearchHit>> = stream::iter(queries.iter().cloned())
        .map(|query| async move { search_with_fallback(backends, &query, per_query).await })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|hit| match canonical_url(&hit.url) {
            Some(url) => seen.insert(url),
            None => false,
        })
        .collect()
}

/// Scrapes `urls` with at most `concurrency` requests in flight. Failed pages
/// are dropped.
pub async fn scrape_all(scraper: &Arc<dyn Scraper>, urls: Vec<String>, concurrency: usize) -> Vec<Source> {
    let pages: Vec<Option<Source>> = stream::iter(urls)
        .map(|url| {
            let scraper = Arc::clone(scraper);
            async move {
                match scraper.scrape(&url).await {
                    Ok(page) => Source::from_page(page, Timestamp::now()),
                    Err(error) => {
                        tracing::warn!(url = %url, %error, "scrape failed; dropping page");
                        None
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;
    pages.into_iter().flatten().collect()
}

/// Searches for the outline's queries, scrapes the hits, and keeps the best
/// `max_sources` sources not already in `held`.
///
/// Hits whose canonical URL is already held are dropped before scraping, so
/// they are never fetched again and do not use up `max_search_results`. Held
/// ids are checked again after scraping to catch redirects onto a held page.
pub async fn harvest_sources(
    outline: &Outline,
    backends: &[Arc<dyn SearchBackend>],
    scraper: &Arc<dyn Scraper>,
    limits: HarvestLimits,
    held: &[Source],
) -> Harvest {
    let held_urls = held.iter().map(|s| s.url.as_str()).collect::<HashSet<_>>();
    let held_ids = held.iter().map(|s| &s.source_id).collect::<HashSet<_>>();

    let queries = outline.search_queries();
    let per_query = (limits.max_search_results / queries.len().max(1)).max(1);
    let hits = multi_query_search(backends, &queries, per_query, limits.search_concurrency).await;
    tracing::info!(queries = queries.len(), hits = hits.len(), "search complete");

    let urls = hits
        .into_iter()
        .filter(|hit| canonical_url(&hit.url).is_some_and(|url| !held_urls.contains(url.as_str())))
        .take(limits.max_search_results)
        .map(|hit| hit.url)
        .collect::<Vec<_>>();
    let fetched = scrape_all(scraper, urls, limits.scrape_concurrency).await;
    let candidates = deduplicate_sources(fetched)
        .into_iter()
        .filter(|s| !held_ids.contains(&s.source_id) && !held_urls.contains(s.url.as_str()))
        .collect::<Vec<_>>();
    let total_candidates = candidates.len();

    let mut sources = rank_sources(candidates, outline);
    sources.truncate(limits.max_sources);
    tracing::info!(selected = sources.len(), candidates = total_candidates, "sources harvested");

    Harvest { sources, total_candidates }
}
