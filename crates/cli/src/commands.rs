//! Command-line surface and the `run` / `config` handlers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use llm::{ChatProvider, ChatProviderConfig};
use nodes::{LlmGateway, PipelineExecutor, RateLimiter, RunContext, Services};
use pipeline::{PublishReceipt, Publisher, RunId, RunState, RunStatus, SearchBackend, TopicSpec};
use publish::{publisher_for, DryRunPublisher, PublishSettings};
use research::{DuckDuckGoSearch, HttpScraper, MemoryVectorStore, ScraperConfig, TavilySearch};

use crate::config::AppConfig;

/// Research a topic and write a cited, quality-gated article.
#[derive(Parser, Debug)]
#[command(name = "scrivener", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./scrivener.toml when present)
    #[arg(long, global = true, env = "SCRIVENER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline on a topic
    Run(RunArgs),
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Research topic or question
    pub topic: String,

    /// Target audience
    #[arg(long, default_value = "general")]
    pub audience: String,

    /// Specific goal for the article (repeatable)
    #[arg(long = "goal")]
    pub goals: Vec<String>,

    /// Target SEO keyword (repeatable)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Extra constraint as key=value (repeatable)
    #[arg(long = "constraint", value_parser = parse_constraint)]
    pub constraints: Vec<(String, String)>,

    /// Output directory for saved runs
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Send the article to the configured publish target instead of saving it locally
    #[arg(long)]
    pub publish: bool,
}

fn parse_constraint(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("constraint '{raw}' has an empty key"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl RunArgs {
    fn topic_spec(&self) -> Result<TopicSpec> {
        let spec = TopicSpec::new(self.topic.clone(), self.audience.clone())?
            .with_goals(self.goals.clone())
            .with_keywords(self.keywords.clone());
        Ok(self
            .constraints
            .iter()
            .fold(spec, |spec, (key, value)| spec.with_constraint(key, value)))
    }
}

/// Builds the process-wide collaborators from configuration.
fn services(config: &AppConfig) -> Result<Services> {
    let api_key = config
        .groq_api_key
        .clone()
        .ok_or_else(|| anyhow!("GROQ_API_KEY is not set"))?;
    let provider = ChatProvider::new(ChatProviderConfig::groq(api_key)).context("could not build the Groq client")?;
    let limiter = RateLimiter::new(config.pipeline.rate_limits());
    let gateway = LlmGateway::new(Arc::new(provider), Arc::new(limiter), config.pipeline.model_routing()?);

    let mut search: Vec<Arc<dyn SearchBackend>> = Vec::new();
    if config.tavily_api_key.is_some() {
        search.push(Arc::new(
            TavilySearch::new(config.tavily_api_key.clone()).context("could not build the Tavily client")?,
        ));
    }
    search.push(Arc::new(DuckDuckGoSearch::new().context("could not build the DuckDuckGo client")?));

    Ok(Services {
        gateway: Arc::new(gateway),
        search,
        scraper: Arc::new(HttpScraper::new(ScraperConfig::default()).context("could not build the HTTP scraper")?),
        store: Arc::new(MemoryVectorStore::new()),
    })
}

fn print_summary(state: &RunState) {
    if let Some(metrics) = &state.quality {
        println!("Quality metrics");
        println!("  Citation coverage    {:.1}%", metrics.citation_coverage * 100.0);
        println!("  Unsupported claims   {:.1}%", metrics.unsupported_claim_rate * 100.0);
        println!("  Avg fact confidence  {:.2}", metrics.avg_fact_confidence);
        println!("  Reading level        {:.1}", metrics.reading_level);
        println!("  Claims / sources     {} / {}", metrics.total_claims, metrics.total_sources);
    }
    if let Some(run) = &state.run_metrics {
        println!(
            "\nTime: {:.1}s | Tokens: {} | Model calls: {}",
            run.elapsed_seconds, run.total_tokens, run.total_calls
        );
    }
    if let Some(gate) = state.gate.as_ref().filter(|g| !g.passed) {
        println!("\nQuality gate failed after {} retries:", state.retry_count);
        for reason in &gate.failure_reasons {
            println!("  - {reason}");
        }
    }
    println!("\nPipeline steps:");
    for entry in &state.logs {
        println!("  [{}] {}: {}", entry.timestamp, entry.stage, entry.message);
    }
}

pub async fn run(args: RunArgs, mut config: AppConfig) -> Result<ExitCode> {
    if let Some(out) = &args.out {
        config.publish.output_dir = out.clone();
    }
    let topic = args.topic_spec()?;
    let services = services(&config)?;
    let executor = PipelineExecutor::with_default_nodes();
    let ctx = RunContext::new(RunId::new_random(), Arc::new(config.pipeline.clone()), services);

    println!("Topic: {}\nAudience: {}\nRun: {}\n", topic.topic, topic.audience, ctx.run_id);
    let state = executor.run(topic, &ctx).await;

    if state.status == RunStatus::Failed {
        eprintln!("Pipeline failed: {}", state.error.as_deref().unwrap_or("unknown error"));
        return Ok(ExitCode::FAILURE);
    }
    println!("Pipeline finished: {}\n", state.status);
    print_summary(&state);

    let receipt = deliver(&state, &config.publish, args.publish).await?;
    println!("\n{:?}: {}", receipt.status, receipt.location);
    Ok(ExitCode::SUCCESS)
}

/// Sends the article to the configured target, or saves it locally.
async fn deliver(state: &RunState, settings: &PublishSettings, publish: bool) -> Result<PublishReceipt> {
    let receipt = if publish {
        publisher_for(settings)?.publish(state).await
    } else {
        DryRunPublisher::new(&settings.output_dir).publish(state).await
    };
    receipt.context("could not deliver the article")
}

pub fn show_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(&config.redacted()).context("could not render configuration")?;
    print!("{rendered}");
    if config.groq_api_key.is_none() {
        bail!("GROQ_API_KEY is not set; `scrivener run` will fail");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pipeline::{build_citation_map, Article, PublishStatus, StageDelta};

    use super::*;

    #[test]
    fn run_arguments_build_the_topic() {
        let cli = Cli::parse_from([
            "scrivener",
            "run",
            "Rust memory safety",
            "--audience",
            "backend developers",
            "--goal",
            "explain ownership",
            "--keyword",
            "rust",
            "--keyword",
            "borrow checker",
            "--constraint",
            "tone = friendly",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        let topic = args.topic_spec().unwrap();
        assert_eq!(topic.audience, "backend developers");
        assert_eq!(topic.goals, vec!["explain ownership"]);
        assert_eq!(topic.keywords, vec!["rust", "borrow checker"]);
        assert_eq!(topic.constraints.get("tone").map(String::as_str), Some("friendly"));
        assert!(!args.publish);
    }

    #[test]
    fn constraint_without_equals_is_rejected() {
        assert!(Cli::try_parse_from(["scrivener", "run", "topic", "--constraint", "tone"]).is_err());
        assert!(parse_constraint("=x").is_err());
    }

    #[test]
    fn audience_defaults_to_general() {
        let cli = Cli::parse_from(["scrivener", "run", "Rust"]);
        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.audience, "general");
    }

    fn written_run() -> RunState {
        let body = "Rust has no garbage collector [COMMON].";
        RunState::new(RunId::new_random(), TopicSpec::new("Rust", "developers").unwrap()).apply(
            StageDelta::Written {
                article: Article::new("Rust", body, build_citation_map(body, &[], &[])),
            },
        )
    }

    #[tokio::test]
    async fn unpublished_runs_are_saved_locally() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PublishSettings {
            output_dir: dir.path().to_path_buf(),
            ..PublishSettings::default()
        };
        let state = written_run();

        let receipt = deliver(&state, &settings, false).await.unwrap();

        assert_eq!(receipt.status, PublishStatus::Saved);
        assert!(dir.path().join(format!("{}.md", state.run_id)).exists());
    }

    #[tokio::test]
    async fn delivery_failure_names_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PublishSettings {
            output_dir: dir.path().to_path_buf(),
            ..PublishSettings::default()
        };
        let state = RunState::new(RunId::new_random(), TopicSpec::new("Rust", "developers").unwrap());

        let error = deliver(&state, &settings, false).await.unwrap_err();
        assert!(error.to_string().contains("could not deliver the article"));
    }

    #[test]
    fn services_need_a_groq_key() {
        let error = services(&AppConfig::default()).err().unwrap();
        assert!(error.to_string().contains("GROQ_API_KEY"));
    }
}
