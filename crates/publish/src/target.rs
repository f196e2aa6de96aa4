//! Publisher selection from configuration.

use std::path::PathBuf;

use pipeline::{PipelineError, Publisher};
use serde::{Deserialize, Serialize};

use crate::{DryRunPublisher, WordPressCredentials, WordPressPublisher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTarget {
    #[default]
    DryRun,
    Wordpress,
}

impl std::str::FromStr for PublishTarget {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dry_run" | "dry-run" | "dryrun" => Ok(Self::DryRun),
            "wordpress" => Ok(Self::Wordpress),
            other => Err(PipelineError::Configuration {
                message: format!("unknown publish target '{other}'"),
            }),
        }
    }
}

/// The `[publish]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub target: PublishTarget,
    pub output_dir: PathBuf,
    pub cms_url: Option<String>,
    /// Application password, or a bearer token when no username is set.
    pub cms_token: Option<String>,
    pub cms_username: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            target: PublishTarget::DryRun,
            output_dir: PathBuf::from("outputs"),
            cms_url: None,
            cms_token: None,
            cms_username: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Builds the configured publisher. WordPress without a URL or token falls
/// back to the dry run with a warning.
pub fn publisher_for(settings: &PublishSettings) -> Result<Box<dyn Publisher>, PipelineError> {
    match settings.target {
        PublishTarget::DryRun => Ok(Box::new(DryRunPublisher::new(&settings.output_dir))),
        PublishTarget::Wordpress => {
            let (Some(url), Some(token)) = (non_blank(&settings.cms_url), non_blank(&settings.cms_token)) else {
                tracing::warn!("wordpress credentials missing; falling back to dry run");
                return Ok(Box::new(DryRunPublisher::new(&settings.output_dir)));
            };
            let credentials = match non_blank(&settings.cms_username) {
                Some(username) => WordPressCredentials::ApplicationPassword {
                    username: username.to_string(),
                    password: token.to_string(),
                },
                None => WordPressCredentials::Bearer(token.to_string()),
            };
            let publisher = WordPressPublisher::new(url, credentials).map_err(|e| PipelineError::Configuration {
                message: format!("could not build the WordPress client: {e}"),
            })?;
            Ok(Box::new(publisher))
        }
    }
}
