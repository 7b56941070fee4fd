//! Job driver: prompts -> two model runs -> table -> hub
//!
//! Every step runs after the previous one completes. Any error ends the job;
//! only the publish step retries.

use std::sync::Arc;

use shared::{CompletionTable, Stage, logging, stage_info};
use crate::config::JobConfig;
use crate::core::generator::ResponseGenerator;
use crate::core::publisher::RetryingPublisher;
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::{HubPublisher, ModelBackend, PromptSource};
use crate::types::JobSummary;

/// One configured run of the paired-completions job
pub struct CompletionJob<P, M, H>
where
    P: PromptSource + 'static,
    M: ModelBackend + 'static,
    H: HubPublisher + 'static,
{
    config: JobConfig,
    prompt_source: Arc<P>,
    generator: ResponseGenerator<M>,
    publisher: RetryingPublisher<H>,
}

impl<P, M, H> CompletionJob<P, M, H>
where
    P: PromptSource + 'static,
    M: ModelBackend + 'static,
    H: HubPublisher + 'static,
{
    pub fn new(config: JobConfig, prompt_source: Arc<P>, backend: Arc<M>, hub: Arc<H>) -> Self {
        let publisher = RetryingPublisher::new(hub, config.retry.clone());
        Self {
            config,
            prompt_source,
            generator: ResponseGenerator::new(backend),
            publisher,
        }
    }

    /// Load prompts and generate both completion columns
    pub async fn build_table(&self) -> CompletionsResult<CompletionTable> {
        let config = &self.config;

        let selection = config.dataset_selection();
        logging::log_progress(
            Stage::LoadPrompts,
            "Loading prompts",
            &format!(
                "{} rows of {} [{}] field '{}'",
                selection.limit, selection.dataset_id, selection.split, selection.prompt_field
            ),
        );
        let prompts = self.prompt_source.load_prompts(&selection).await?;
        if prompts.len() != selection.limit {
            return Err(CompletionsError::dataset(
                &selection.dataset_id,
                format!("expected {} prompts, got {}", selection.limit, prompts.len()),
            ));
        }
        stage_info!(Stage::LoadPrompts, "📥 Loaded {} prompts", prompts.len());

        let base_completions = self
            .generator
            .in_stage(Stage::BaseInference)
            .generate(&prompts, &config.base_model_id, config.batch_size)
            .await?;

        let ft_completions = self
            .generator
            .in_stage(Stage::FtInference)
            .generate(&prompts, &config.ft_model_id, config.batch_size)
            .await?;

        Ok(CompletionTable::from_columns(prompts, base_completions, ft_completions)?)
    }

    /// Run the whole job once
    pub async fn run(&self) -> CompletionsResult<JobSummary> {
        self.config.validate()?;
        let destination = self.config.destination()?;

        let table = self.build_table().await?;

        if let Some(path) = &self.config.output_file {
            table.write_jsonl(path)?;
            stage_info!(Stage::Job, "💾 Wrote {} rows to {}", table.len(), path.display());
        }

        let report = self.publisher.publish(&table, &destination).await?;

        Ok(JobSummary {
            rows: report.rows,
            destination: report.destination,
            publish_attempts: report.attempts,
        })
    }
}

/// Build and run a job with the given collaborators
pub async fn run_job<P, M, H>(config: JobConfig, prompt_source: P, backend: M, hub: H) -> CompletionsResult<JobSummary>
where
    P: PromptSource + 'static,
    M: ModelBackend + 'static,
    H: HubPublisher + 'static,
{
    CompletionJob::new(config, Arc::new(prompt_source), Arc::new(backend), Arc::new(hub))
        .run()
        .await
}
