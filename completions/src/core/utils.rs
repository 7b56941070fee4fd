//! Pure utility functions for the completions job

use std::time::Duration;

use crate::error::{CompletionsError, CompletionsResult};
use crate::types::{BackoffStrategy, MAX_BACKOFF_DELAY};

/// Split prompts into contiguous chunks of at most `batch_size` (pure function)
pub fn partition_batches(prompts: &[String], batch_size: usize) -> CompletionsResult<Vec<&[String]>> {
    if batch_size == 0 {
        return Err(CompletionsError::config("batch_size must be at least 1"));
    }
    Ok(prompts.chunks(batch_size).collect())
}

/// Last path segment of a hub identifier, e.g. `trl-lib/tldr` -> `tldr` (pure function)
pub fn repo_name(identifier: &str) -> CompletionsResult<&str> {
    let name = identifier.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(CompletionsError::config(format!(
            "cannot derive a name from identifier '{identifier}'"
        )));
    }
    Ok(name)
}

/// Destination repository id: `{organization}/{dataset_name}-{ft_model_name}-completions` (pure function)
pub fn derive_destination_id(organization: &str, dataset_id: &str, ft_model_id: &str) -> CompletionsResult<String> {
    let dataset_name = repo_name(dataset_id)?;
    let model_name = repo_name(ft_model_id)?;
    Ok(format!("{organization}/{dataset_name}-{model_name}-completions"))
}

/// Delay to wait after the given failed attempt (1-based) (pure function)
pub fn retry_delay(strategy: BackoffStrategy, base: Duration, attempt: u32) -> Duration {
    match strategy {
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Exponential => {
            let exponent = attempt.saturating_sub(1).min(16);
            base.saturating_mul(1 << exponent).min(MAX_BACKOFF_DELAY.max(base))
        }
    }
}
