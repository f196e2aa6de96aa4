//! WordPress REST draft publisher.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{PublishError, PublishReceipt, PublishStatus, Publisher, RunState};
use serde::{Deserialize, Serialize};

pub const WORDPRESS_POSTS_PATH: &str = "/wp-json/wp/v2/posts";

/// How requests authenticate.
#[derive(Clone)]
pub enum WordPressCredentials {
    /// Username plus application password, sent as HTTP basic auth.
    ApplicationPassword { username: String, password: String },
    /// A bearer token from a JWT or OAuth plugin.
    Bearer(String),
}

impl std::fmt::Debug for WordPressCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApplicationPassword { username, .. } => f
                .debug_struct("ApplicationPassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Serialize)]
struct NewPost<'a> {
    title: &'a str,
    content: String,
    excerpt: &'a str,
    slug: &'a str,
    status: &'static str,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: u64,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Deserialize)]
struct WpError {
    message: String,
}

/// Creates every article as a draft post; nothing is published live.
///
/// The post takes its title, slug and excerpt from the SEO metadata when
/// present, else from the article. The receipt location is the post link,
/// or `post <id>` when the API returns none.
pub struct WordPressPublisher {
    client: reqwest::Client,
    posts_url: String,
    credentials: WordPressCredentials,
}

impl WordPressPublisher {
    pub fn new(base_url: &str, credentials: WordPressCredentials) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?,
            posts_url: format!("{}{WORDPRESS_POSTS_PATH}", base_url.trim_end_matches('/')),
            credentials,
        })
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    fn name(&self) -> &str {
        "wordpress"
    }

    async fn publish(&self, state: &RunState) -> Result<PublishReceipt, PublishError> {
        let article = state
            .article
            .as_ref()
            .ok_or(pipeline::ExportError::MissingArticle { run_id: state.run_id })?;
        let seo = state.seo.as_ref();
        let post = NewPost {
            title: seo.map_or(article.title.as_str(), |s| s.title.as_str()),
            content: article.rendered(),
            excerpt: seo.map_or("", |s| s.meta_description.as_str()),
            slug: seo.map_or("", |s| s.slug.as_str()),
            status: "draft",
        };

        let request = self.client.post(&self.posts_url).json(&post);
        let request = match &self.credentials {
            WordPressCredentials::ApplicationPassword { username, password } => {
                request.basic_auth(username, Some(password))
            }
            WordPressCredentials::Bearer(token) => request.bearer_auth(token),
        };
        let response = request.send().await.map_err(|e| PublishError::Transport { message: e.to_string() })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport { message: e.to_string() })?;
        if !status.is_success() {
            let message = serde_json::from_str::<WpError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| body.chars().take(300).collect());
            tracing::error!(run_id = %state.run_id, status = status.as_u16(), %message, "wordpress rejected the post");
            return Err(PublishError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedPost = serde_json::from_str(&body).map_err(|e| PublishError::Transport {
            message: format!("unexpected response body: {e}"),
        })?;
        let location = created.link.unwrap_or_else(|| format!("post {}", created.id));
        tracing::info!(run_id = %state.run_id, post_id = created.id, %location, "draft created");
        Ok(PublishReceipt {
            status: PublishStatus::Draft,
            location,
        })
    }
}
