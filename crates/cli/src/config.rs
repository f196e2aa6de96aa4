//! Application configuration: a TOML file plus environment overrides.
//!
//! ```toml
//! log_level = "info"
//! log_format = "json"
//! # otlp_endpoint = "http://localhost:4317"
//!
//! [pipeline]
//! writer_model = "llama-3.1-70b-versatile"
//! max_retries = 2
//!
//! [publish]
//! target = "dry_run"
//! output_dir = "outputs"
//! ```
//!
//! API keys are normally supplied through `GROQ_API_KEY` and
//! `TAVILY_API_KEY` rather than the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use nodes::PipelineConfig;
use publish::{PublishSettings, PublishTarget};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "scrivener.toml";

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "console" => Ok(Self::Console),
            other => bail!("unknown log format '{other}' (expected json or console)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
    /// OTLP gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    pub groq_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub pipeline: PipelineConfig,
    pub publish: PublishSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            otlp_endpoint: None,
            groq_api_key: None,
            tavily_api_key: None,
            pipeline: PipelineConfig::default(),
            publish: PublishSettings::default(),
        }
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}"))
}

impl AppConfig {
    /// Reads `path`, or `scrivener.toml` in the working directory when no
    /// path is given, then applies the process environment. A missing default
    /// file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("could not read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("could not parse config file {}", path.display()))
    }

    /// Overrides fields from environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GROQ_API_KEY") {
            self.groq_api_key = Some(v);
        }
        if let Some(v) = var("TAVILY_API_KEY") {
            self.tavily_api_key = Some(v);
        }
        if let Some(v) = var("SCRIVENER_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("SCRIVENER_LOG_FORMAT") {
            self.log_format = v.parse()?;
        }
        if let Some(v) = var("SCRIVENER_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(v);
        }

        let pipeline = &mut self.pipeline;
        if let Some(v) = var("SCRIVENER_ORCHESTRATION_MODEL") {
            pipeline.orchestration_model = v;
        }
        if let Some(v) = var("SCRIVENER_WRITER_MODEL") {
            pipeline.writer_model = v;
        }
        if let Some(v) = var("SCRIVENER_MAX_RETRIES") {
            pipeline.max_retries = parse("SCRIVENER_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("SCRIVENER_TIMEOUT_SECONDS") {
            pipeline.timeout_seconds = parse("SCRIVENER_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = var("SCRIVENER_MIN_CITATION_COVERAGE") {
            pipeline.thresholds.min_citation_coverage = parse("SCRIVENER_MIN_CITATION_COVERAGE", &v)?;
        }
        if let Some(v) = var("SCRIVENER_MAX_UNSUPPORTED_CLAIM_RATE") {
            pipeline.thresholds.max_unsupported_claim_rate = parse("SCRIVENER_MAX_UNSUPPORTED_CLAIM_RATE", &v)?;
        }
        if let Some(v) = var("SCRIVENER_MIN_FACT_CONFIDENCE") {
            pipeline.thresholds.min_fact_confidence = parse("SCRIVENER_MIN_FACT_CONFIDENCE", &v)?;
        }

        let publish = &mut self.publish;
        if let Some(v) = var("SCRIVENER_OUTPUT_DIR") {
            publish.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("SCRIVENER_PUBLISH_TARGET") {
            publish.target = v.parse::<PublishTarget>()?;
        }
        if let Some(v) = var("SCRIVENER_CMS_URL") {
            publish.cms_url = Some(v);
        }
        if let Some(v) = var("SCRIVENER_CMS_TOKEN") {
            publish.cms_token = Some(v);
        }
        if let Some(v) = var("SCRIVENER_CMS_USERNAME") {
            publish.cms_username = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        Ok(())
    }

    /// A copy safe to print: every secret that is set becomes `<redacted>`.
    pub fn redacted(&self) -> Self {
        let hide = |secret: &Option<String>| secret.as_ref().map(|_| REDACTED.to_string());
        let mut copy = self.clone();
        copy.groq_api_key = hide(&self.groq_api_key);
        copy.tavily_api_key = hide(&self.tavily_api_key);
        copy.publish.cms_token = hide(&self.publish.cms_token);
        copy
    }
}
