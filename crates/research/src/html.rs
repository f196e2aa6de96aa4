//! Main-content and metadata extraction from HTML pages.

use scraper::{ElementRef, Html, Selector};

use pipeline::ScrapedPage;

pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ScrivenerBot/0.1; +https://github.com/pvandervelde/scrivener)";

/// An `article`/`main` container with less text than this is ignored in
/// favour of the whole document.
const MIN_MAIN_CONTENT_CHARS: usize = 200;

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, p, li, blockquote, pre, td";

pub(crate) fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_match<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    first_match(document, css)
        .and_then(|e| e.value().attr("content"))
        .map(compact_ws)
        .filter(|s| !s.is_empty())
}

fn text_blocks(root: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse(BLOCK_SELECTOR) else {
        return Vec::new();
    };
    root.select(&selector)
        .map(|e| compact_ws(&e.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Visible text under `root`, skipping script and style contents.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style" | "noscript")))
            .unwrap_or(false);
        if !hidden {
            parts.push(&**text);
        }
    }
    compact_ws(&parts.join(" "))
}

fn main_text(document: &Html) -> String {
    for container in ["article", "main"] {
        if let Some(root) = first_match(document, container) {
            let text = text_blocks(root).join("\n\n");
            if text.chars().count() >= MIN_MAIN_CONTENT_CHARS {
                return text;
            }
        }
    }
    let root = document.root_element();
    let blocks = text_blocks(root);
    if blocks.is_empty() {
        first_match(document, "body").map(visible_text).unwrap_or_default()
    } else {
        blocks.join("\n\n")
    }
}

/// Extracts the readable text, title, author and publication date of a page.
///
/// Text comes from the `article` or `main` element when it holds enough of
/// it, else from every text block in the document. The title prefers
/// `og:title` over `<title>`.
pub fn extract_page(html: &str, final_url: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#).or_else(|| {
        first_match(&document, "title")
            .map(|t| compact_ws(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });
    let author = meta_content(&document, r#"meta[name="author"]"#)
        .or_else(|| meta_content(&document, r#"meta[property="article:author"]"#));
    let published_date = meta_content(&document, r#"meta[property="article:published_time"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="date"]"#))
        .or_else(|| {
            first_match(&document, "time[datetime]")
                .and_then(|t| t.value().attr("datetime"))
                .map(str::to_string)
        });

    ScrapedPage {
        final_url: final_url.to_string(),
        raw_text: main_text(&document),
        title,
        author,
        published_date,
    }
}
