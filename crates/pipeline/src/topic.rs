//! Run input ([`TopicSpec`]) and the planning product ([`Outline`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// The immutable input of a run: what to write about and for whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    /// The research topic or question.
    pub topic: String,
    /// Target audience (e.g. `"engineering managers"`).
    pub audience: String,
    /// Specific goals the article should achieve.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Keywords the article should target.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Free-form constraints (e.g. `"tone" = "neutral"`).
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
}

impl TopicSpec {
    /// Creates a topic specification with no goals, keywords or constraints.
    ///
    /// Returns [`PipelineError::InvalidTopic`] if the topic is blank. A blank
    /// audience falls back to `"general"`.
    pub fn new(topic: impl Into<String>, audience: impl Into<String>) -> Result<Self, PipelineError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(PipelineError::InvalidTopic {
                reason: "topic must not be empty".to_string(),
            });
        }
        let audience = audience.into().trim().to_string();
        Ok(Self {
            topic,
            audience: if audience.is_empty() { "general".to_string() } else { audience },
            goals: Vec::new(),
            keywords: Vec::new(),
            constraints: BTreeMap::new(),
        })
    }

    /// Replaces the goal list.
    #[must_use]
    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    /// Replaces the keyword list.
    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Adds one constraint, replacing any earlier value for the same key.
    #[must_use]
    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }
}

/// One planned section of the article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Section heading.
    pub title: String,
    /// Questions the section must answer; used as retrieval queries.
    #[serde(default)]
    pub key_questions: Vec<String>,
    /// Claims the planner expects the section to make.
    #[serde(default)]
    pub expected_claims: Vec<String>,
    /// Target length of the section.
    #[serde(default = "default_section_words")]
    pub estimated_words: u32,
}

fn default_section_words() -> u32 {
    400
}

/// The article plan produced by the Plan stage.
///
/// Treated as stable once produced: the retry loop re-enters at Index, never
/// at Plan, so the outline is never regenerated within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    /// Working title of the article.
    pub title: String,
    /// Planned sections in reading order.
    pub sections: Vec<OutlineSection>,
    /// Keywords the article should rank for.
    #[serde(default)]
    pub target_keywords: Vec<String>,
    /// Sum of the planned section lengths, as estimated by the planner.
    #[serde(default)]
    pub estimated_total_words: u32,
    /// Why the planner chose this structure.
    #[serde(default)]
    pub rationale: String,
}

impl Outline {
    /// Search queries for source harvesting: the title, every section title,
    /// then at most three target keywords.
    pub fn search_queries(&self) -> Vec<String> {
        let mut queries = Vec::with_capacity(1 + self.sections.len() + 3);
        queries.push(self.title.clone());
        queries.extend(self.sections.iter().map(|s| s.title.clone()));
        queries.extend(self.target_keywords.iter().take(3).cloned());
        queries
    }

    /// Keywords used for relevance scoring: target keywords plus lower-cased
    /// section titles, de-duplicated.
    pub fn relevance_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .target_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .chain(self.sections.iter().map(|s| s.title.to_lowercase()))
            .filter(|k| !k.trim().is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        keywords
    }
}
