//! Read-only projections of a finished run: a publishable Markdown document
//! and a JSON snapshot.

use serde::Serialize;
use thiserror::Error;

use crate::{
    Article, GateDecision, LogEntry, QualityMetrics, RunId, RunMetrics, RunState, RunStatus,
    SeoMetadata,
};

#[derive(Debug, Error)]
pub enum ExportError {
    /// Markdown export needs a composed article.
    #[error("run {run_id} has no article to export")]
    MissingArticle { run_id: RunId },

    #[error("could not serialise run snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Renders the run as Markdown: YAML frontmatter and a JSON-LD block (when
/// SEO metadata exists), the article with its references, and a metadata
/// footer.
pub fn export_markdown(state: &RunState) -> Result<String, ExportError> {
    let article = state
        .article
        .as_ref()
        .ok_or(ExportError::MissingArticle { run_id: state.run_id })?;

    let mut parts = Vec::new();
    if let Some(seo) = &state.seo {
        parts.push(frontmatter(seo));
        parts.push(String::new());
        parts.push(json_ld_block(seo)?);
        parts.push(String::new());
    }
    parts.push(article.rendered());
    parts.push(String::new());
    parts.push("---".to_string());
    parts.push(String::new());
    parts.push(format!("**Word Count:** {}  ", article.word_count));
    parts.push(format!("**Reading Level:** {:.1} (Flesch)  ", article.reading_level));
    parts.push(format!(
        "**Citation Coverage:** {:.1}%  ",
        article.citations.coverage_rate * 100.0
    ));
    parts.push(format!("**Sources:** {}  ", article.citations.bibliography.len()));
    Ok(parts.join("\n"))
}

fn frontmatter(seo: &SeoMetadata) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("title: {}", yaml_string(&seo.title)),
        format!("slug: {}", seo.slug),
        format!("description: {}", yaml_string(&seo.meta_description)),
        "keywords:".to_string(),
    ];
    lines.extend(seo.keywords.iter().map(|k| format!("  - {}", yaml_string(k))));
    lines.push(format!("h1: {}", yaml_string(&seo.h1)));
    lines.push("---".to_string());
    lines.join("\n")
}

/// Double-quoted YAML scalar; JSON string escaping is valid YAML.
fn yaml_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn json_ld_block(seo: &SeoMetadata) -> Result<String, ExportError> {
    Ok(format!(
        "<script type=\"application/ld+json\">\n{}\n</script>",
        serde_json::to_string_pretty(&seo.json_ld)?
    ))
}

#[derive(Serialize)]
struct ArticleSnapshot<'a> {
    title: &'a str,
    content: String,
    word_count: usize,
    reading_level: f64,
    citation_coverage: f64,
}

#[derive(Serialize)]
struct RunSnapshot<'a> {
    run_id: RunId,
    status: RunStatus,
    error: Option<&'a str>,
    topic: &'a str,
    article: Option<ArticleSnapshot<'a>>,
    seo: Option<&'a SeoMetadata>,
    metrics: Option<&'a QualityMetrics>,
    run_metrics: Option<&'a RunMetrics>,
    gate: Option<&'a GateDecision>,
    retry_count: u32,
    logs: &'a [LogEntry],
}

fn article_snapshot(article: &Article) -> ArticleSnapshot<'_> {
    ArticleSnapshot {
        title: &article.title,
        content: article.rendered(),
        word_count: article.word_count,
        reading_level: article.reading_level,
        citation_coverage: article.citations.coverage_rate,
    }
}

/// Summarises the run as a JSON object. Works for failed runs too.
pub fn export_json(state: &RunState) -> Result<serde_json::Value, ExportError> {
    let snapshot = RunSnapshot {
        run_id: state.run_id,
        status: state.status,
        error: state.error.as_deref(),
        topic: &state.topic.topic,
        article: state.article.as_ref().map(article_snapshot),
        seo: state.seo.as_ref(),
        metrics: state.quality.as_ref(),
        run_metrics: state.run_metrics.as_ref(),
        gate: state.gate.as_ref(),
        retry_count: state.retry_count,
        logs: &state.logs,
    };
    Ok(serde_json::to_value(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_citation_map, StageDelta, TopicSpec};

    fn seo() -> SeoMetadata {
        SeoMetadata {
            title: "Rust \"fast\"".into(),
            slug: "rust-fast".into(),
            meta_description: "d".into(),
            keywords: vec!["rust".into()],
            h1: "Rust".into(),
            h2_headings: vec![],
            internal_links: vec![],
            json_ld: serde_json::json!({"@type": "Article"}),
        }
    }

    fn state_with_article() -> RunState {
        let body = "Rust is fast [COMMON].";
        RunState::new(RunId::new_random(), TopicSpec::new("Rust", "devs").unwrap())
            .apply(StageDelta::Written {
                article: Article::new("Rust", body, build_citation_map(body, &[], &[])),
            })
            .apply(StageDelta::Optimized { seo: seo() })
    }

    #[test]
    fn markdown_without_article_fails() {
        let state = RunState::new(RunId::new_random(), TopicSpec::new("Rust", "devs").unwrap());
        assert!(matches!(export_markdown(&state), Err(ExportError::MissingArticle { .. })));
    }

    #[test]
    fn markdown_has_frontmatter_json_ld_body_and_footer() {
        let md = export_markdown(&state_with_article()).unwrap();
        assert!(md.starts_with("---\ntitle: \"Rust \\\"fast\\\"\"\nslug: rust-fast"));
        assert!(md.contains("<script type=\"application/ld+json\">"));
        assert!(md.contains("Rust is fast [COMMON]."));
        assert!(md.contains("**Citation Coverage:** 100.0%"));
        assert!(md.ends_with("**Sources:** 0  "));
    }

    #[test]
    fn json_snapshot_fields() {
        let state = state_with_article();
        let json = export_json(&state).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["topic"], "Rust");
        assert_eq!(json["article"]["word_count"], 3);
        assert_eq!(json["seo"]["slug"], "rust-fast");
        assert!(json["gate"].is_null());
        assert_eq!(json["logs"].as_array().unwrap().len(), 2);
    }
}
