//! Job configuration
//!
//! Everything the driver needs is carried explicitly in `JobConfig`; the binary
//! fills it from command-line flags whose defaults reproduce the TL;DR PPO run.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use shared::DatasetDestination;
use crate::core::utils::derive_destination_id;
use crate::error::{CompletionsError, CompletionsResult};
use crate::types::{DatasetSelection, GenerationParams, RetryPolicy};

pub const DEFAULT_BASE_MODEL: &str = "RLHF-And-Friends/TLDR-Mistral-7B-SFT";
pub const DEFAULT_FT_MODEL: &str = "RLHF-And-Friends/TLDR-Mistral-7B-SFT-PPO";
pub const DEFAULT_DATASET: &str = "trl-lib/tldr";
pub const DEFAULT_DATASET_CONFIG: &str = "default";
pub const DEFAULT_SPLIT: &str = "test";
pub const DEFAULT_PROMPT_FIELD: &str = "prompt";
pub const DEFAULT_SAMPLE_SIZE: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_ORGANIZATION: &str = "RLHF-And-Friends";
pub const DEFAULT_OUTPUT_SPLIT: &str = "test";

pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_DATASETS_SERVER_URL: &str = "https://datasets-server.huggingface.co";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

/// Configuration of one job run
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub base_model_id: String,
    pub ft_model_id: String,
    pub dataset_id: String,
    pub dataset_config: String,
    pub split: String,
    pub prompt_field: String,
    pub sample_size: usize,
    pub batch_size: usize,
    /// Owner of the published dataset repository
    pub organization: String,
    pub output_split: String,
    pub retry: RetryPolicy,
    pub generation: GenerationParams,
    /// Optional local JSON Lines copy, written before publishing
    pub output_file: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            base_model_id: DEFAULT_BASE_MODEL.to_string(),
            ft_model_id: DEFAULT_FT_MODEL.to_string(),
            dataset_id: DEFAULT_DATASET.to_string(),
            dataset_config: DEFAULT_DATASET_CONFIG.to_string(),
            split: DEFAULT_SPLIT.to_string(),
            prompt_field: DEFAULT_PROMPT_FIELD.to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            organization: DEFAULT_ORGANIZATION.to_string(),
            output_split: DEFAULT_OUTPUT_SPLIT.to_string(),
            retry: RetryPolicy::default(),
            generation: GenerationParams::default(),
            output_file: None,
        }
    }
}

impl JobConfig {
    /// Check every field before any network call is made
    pub fn validate(&self) -> CompletionsResult<()> {
        for (field, value) in [
            ("base_model_id", &self.base_model_id),
            ("ft_model_id", &self.ft_model_id),
            ("dataset_id", &self.dataset_id),
            ("dataset_config", &self.dataset_config),
            ("split", &self.split),
            ("prompt_field", &self.prompt_field),
            ("organization", &self.organization),
        ] {
            if value.trim().is_empty() {
                return Err(CompletionsError::config(format!("{field} must not be empty")));
            }
        }
        if self.batch_size == 0 {
            return Err(CompletionsError::config("batch_size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(CompletionsError::config("max_publish_attempts must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(CompletionsError::config(format!(
                "temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }
        if self.generation.max_new_tokens == 0 {
            return Err(CompletionsError::config("max_new_tokens must be at least 1"));
        }

        self.destination()?;
        Ok(())
    }

    /// Destination derived from the dataset and fine-tuned model names
    pub fn destination(&self) -> CompletionsResult<DatasetDestination> {
        let repo_id = derive_destination_id(&self.organization, &self.dataset_id, &self.ft_model_id)?;
        Ok(DatasetDestination::new(repo_id, self.output_split.clone())?)
    }

    pub fn dataset_selection(&self) -> DatasetSelection {
        DatasetSelection {
            dataset_id: self.dataset_id.clone(),
            config: self.dataset_config.clone(),
            split: self.split.clone(),
            prompt_field: self.prompt_field.clone(),
            limit: self.sample_size,
        }
    }
}

/// Base URLs and timeouts of the remote services
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEndpoints {
    /// OpenAI-compatible inference server
    pub inference_url: Url,
    pub datasets_server_url: Url,
    pub hub_url: Url,
    /// Timeout for hub and dataset requests
    pub request_timeout: Duration,
    /// Timeout for one inference batch
    pub inference_timeout: Duration,
}

impl ServiceEndpoints {
    pub fn new(inference_url: &str, datasets_server_url: &str, hub_url: &str) -> CompletionsResult<Self> {
        Ok(Self {
            inference_url: parse_base_url(inference_url)?,
            datasets_server_url: parse_base_url(datasets_server_url)?,
            hub_url: parse_base_url(hub_url)?,
            request_timeout: Duration::from_secs(60),
            inference_timeout: Duration::from_secs(600),
        })
    }
}

/// Parse a non-negative, finite number of seconds, e.g. `10` or `0.5`
pub fn parse_delay_seconds(raw: &str) -> CompletionsResult<Duration> {
    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CompletionsError::config(format!("'{raw}' is not a number of seconds")))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(CompletionsError::config(format!(
            "delay must be a finite, non-negative number of seconds, got {raw}"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| CompletionsError::config(format!("delay of {raw} seconds is out of range: {e}")))
}

/// Parse a base URL so that `Url::join` appends to its path instead of replacing it
pub fn parse_base_url(raw: &str) -> CompletionsResult<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(CompletionsError::config(format!("'{raw}' cannot be used as a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
