//! Local filesystem publisher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{export_json, export_markdown, PublishError, PublishReceipt, PublishStatus, Publisher, RunState};

/// Saves the Markdown export and the JSON snapshot of a run side by side.
///
/// The receipt's location is the Markdown file. The output directory is
/// created on first use. A run without an article still gets its JSON
/// snapshot written before the Markdown export fails.
pub struct DryRunPublisher {
    out_dir: PathBuf,
}

impl DryRunPublisher {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn publish(&self, state: &RunState) -> Result<PublishReceipt, PublishError> {
        tokio::fs::create_dir_all(&self.out_dir).await?;

        let json_path = self.out_dir.join(format!("{}.json", state.run_id));
        let snapshot = serde_json::to_string_pretty(&export_json(state)?).map_err(pipeline::ExportError::from)?;
        tokio::fs::write(&json_path, snapshot).await?;

        let markdown_path = self.out_dir.join(format!("{}.md", state.run_id));
        tokio::fs::write(&markdown_path, export_markdown(state)?).await?;

        tracing::info!(
            run_id = %state.run_id,
            markdown = %markdown_path.display(),
            json = %json_path.display(),
            "run saved"
        );
        Ok(PublishReceipt {
            status: PublishStatus::Saved,
            location: markdown_path.display().to_string(),
        })
    }
}
