//! Paired completions binary entry point

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use completions::config::{self, JobConfig, ServiceEndpoints};
use completions::services::{RealHubPublisher, RealModelBackend, RealPromptSource, resolve_token};
use completions::{BackoffStrategy, CompletionsError, GenerationParams, RetryPolicy, run_job};
use shared::{Stage, logging, stage_debug};

/// Generate paired base / fine-tuned completions and publish them as a hub dataset
#[derive(Parser, Debug)]
#[command(name = "completions")]
#[command(about = "Compare a base model with its fine-tuned version on a prompt sample")]
struct Args {
    /// Base model identifier
    #[arg(long, default_value = config::DEFAULT_BASE_MODEL)]
    base_model: String,

    /// Fine-tuned model identifier
    #[arg(long, default_value = config::DEFAULT_FT_MODEL)]
    ft_model: String,

    /// Prompt dataset identifier
    #[arg(long, default_value = config::DEFAULT_DATASET)]
    dataset: String,

    /// Dataset config name
    #[arg(long, default_value = config::DEFAULT_DATASET_CONFIG)]
    dataset_config: String,

    /// Dataset split to sample from
    #[arg(long, default_value = config::DEFAULT_SPLIT)]
    split: String,

    /// Row field holding the prompt text
    #[arg(long, default_value = config::DEFAULT_PROMPT_FIELD)]
    prompt_field: String,

    /// Number of leading rows to use
    #[arg(long, default_value_t = config::DEFAULT_SAMPLE_SIZE)]
    sample_size: usize,

    /// Prompts per inference call
    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Owner of the published dataset
    #[arg(long, default_value = config::DEFAULT_ORGANIZATION)]
    organization: String,

    /// Split name of the published dataset
    #[arg(long, default_value = config::DEFAULT_OUTPUT_SPLIT)]
    output_split: String,

    /// Publish attempts before giving up
    #[arg(long, default_value_t = 5)]
    max_publish_attempts: u32,

    /// Seconds to wait between publish attempts (fractions allowed)
    #[arg(long, default_value = "10", value_parser = config::parse_delay_seconds)]
    publish_retry_delay: Duration,

    /// How the retry delay evolves
    #[arg(long, value_enum, default_value_t = BackoffStrategy::Fixed)]
    backoff: BackoffStrategy,

    /// Maximum tokens generated per completion
    #[arg(long, default_value_t = 128)]
    max_new_tokens: u32,

    /// Sampling temperature (0 = greedy)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// OpenAI-compatible inference server serving both models
    #[arg(long, default_value = config::DEFAULT_INFERENCE_URL)]
    inference_url: String,

    /// Datasets-server base URL
    #[arg(long, default_value = config::DEFAULT_DATASETS_SERVER_URL)]
    datasets_server_url: String,

    /// Hub base URL
    #[arg(long, default_value = config::DEFAULT_HUB_URL)]
    hub_url: String,

    /// Timeout in seconds for dataset and hub requests
    #[arg(long, default_value_t = 60)]
    request_timeout: u64,

    /// Timeout in seconds for one inference batch
    #[arg(long, default_value_t = 600)]
    inference_timeout: u64,

    /// Create the destination repository as private
    #[arg(long)]
    private: bool,

    /// Also write the table as JSON Lines to this path before publishing
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn job_config(&self) -> JobConfig {
        let delay = self.publish_retry_delay;
        let retry = match self.backoff {
            BackoffStrategy::Fixed => RetryPolicy::fixed(self.max_publish_attempts, delay),
            BackoffStrategy::Exponential => RetryPolicy::exponential(self.max_publish_attempts, delay),
        };

        JobConfig {
            base_model_id: self.base_model.clone(),
            ft_model_id: self.ft_model.clone(),
            dataset_id: self.dataset.clone(),
            dataset_config: self.dataset_config.clone(),
            split: self.split.clone(),
            prompt_field: self.prompt_field.clone(),
            sample_size: self.sample_size,
            batch_size: self.batch_size,
            organization: self.organization.clone(),
            output_split: self.output_split.clone(),
            retry,
            generation: GenerationParams {
                max_new_tokens: self.max_new_tokens,
                temperature: self.temperature,
            },
            output_file: self.output_file.clone(),
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let job_config = args.job_config();
    job_config.validate().context("invalid job configuration")?;
    let destination = job_config.destination()?;

    let mut endpoints = ServiceEndpoints::new(&args.inference_url, &args.datasets_server_url, &args.hub_url)
        .context("invalid service endpoint")?;
    endpoints.request_timeout = Duration::from_secs(args.request_timeout);
    endpoints.inference_timeout = Duration::from_secs(args.inference_timeout);

    let hub_token = resolve_token()
        .ok_or_else(|| CompletionsError::config("HF_TOKEN must be set to publish the dataset"))?;
    let inference_key = std::env::var("INFERENCE_API_KEY").ok().filter(|key| !key.is_empty());

    logging::log_startup(Stage::Job, &format!("paired completions job -> {destination}"));
    stage_debug!(
        Stage::Job,
        "Base: {}, fine-tuned: {}, batch size: {}, sample size: {}",
        job_config.base_model_id,
        job_config.ft_model_id,
        job_config.batch_size,
        job_config.sample_size
    );

    let prompt_source = RealPromptSource::new(&endpoints, Some(hub_token.clone()))?;
    let backend = RealModelBackend::new(&endpoints, job_config.generation.clone(), inference_key)?;
    let hub = RealHubPublisher::new(&endpoints, hub_token)?.with_private(args.private);

    let summary = run_job(job_config, prompt_source, backend, hub)
        .await
        .context("paired completions job failed")?;

    logging::log_success(
        Stage::Job,
        &format!(
            "Published {} rows to {} in {} attempt(s)",
            summary.rows, summary.destination, summary.publish_attempts
        ),
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing_with_level(Some(&args.log_level));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            logging::log_error(Stage::Job, "Paired completions job", &format!("{error:#}"));
            ExitCode::FAILURE
        }
    }
}
