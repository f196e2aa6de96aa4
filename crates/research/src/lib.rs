//! Scrivener research adapters.
//!
//! Implements the [`pipeline::SearchBackend`], [`pipeline::Scraper`] and
//! [`pipeline::VectorStore`] ports:
//!
//! | Type | Port | Backing service |
//! |------|------|-----------------|
//! | [`TavilySearch`] | `SearchBackend` | Tavily search API (needs a key) |
//! | [`DuckDuckGoSearch`] | `SearchBackend` | DuckDuckGo HTML results page |
//! | [`HttpScraper`] | `Scraper` | Direct HTTP fetch + HTML content extraction |
//! | [`MemoryVectorStore`] | `VectorStore` | In-process term-frequency index |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, HTML parsing and similarity scoring
//! live here; the `nodes` crate sees only the port traits.

mod duckduckgo;
mod html;
mod scrape;
mod store;
mod tavily;

pub use duckduckgo::{DuckDuckGoSearch, DUCKDUCKGO_HTML_URL};
pub use html::extract_page;
pub use scrape::{HttpScraper, ScraperConfig};
pub use store::MemoryVectorStore;
pub use tavily::{TavilySearch, TAVILY_SEARCH_URL};
