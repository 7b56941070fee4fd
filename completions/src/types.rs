//! Completions job data types

use std::time::Duration;
use serde::{Deserialize, Serialize};
use shared::PublishFailure;

use crate::core::utils::retry_delay;

/// Upper bound for a single exponential backoff delay
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(300);

/// How the delay between publish attempts evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt, capped at `MAX_BACKOFF_DELAY`
    Exponential,
}

/// Bounded retry policy for the publish step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        retry_delay(self.backoff, self.delay, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(10))
    }
}

/// Sampling parameters sent with every inference request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 128,
            temperature: 0.0,
        }
    }
}

/// Which rows of which dataset to read prompts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSelection {
    pub dataset_id: String,
    pub config: String,
    pub split: String,
    pub prompt_field: String,
    /// Number of leading rows to take
    pub limit: usize,
}

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub destination: String,
    pub attempts: u32,
    pub rows: usize,
}

/// State of one publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    /// About to make the given attempt (1-based)
    Attempting { attempt: u32, last_failure: Option<PublishFailure> },
    /// Terminal: the store accepted the table
    Succeeded { attempts: u32 },
    /// Terminal: retries exhausted or a permanent failure was hit
    Failed { attempts: u32, last_failure: PublishFailure },
}

impl PublishState {
    pub fn start() -> Self {
        PublishState::Attempting {
            attempt: 1,
            last_failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PublishState::Attempting { .. })
    }
}

/// Summary of a completed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub rows: usize,
    pub destination: String,
    pub publish_attempts: u32,
}
