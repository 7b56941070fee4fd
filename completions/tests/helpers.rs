//! Test helper utilities for completions integration tests

use std::time::Duration;

use completions::{JobConfig, RetryPolicy};

/// Small job against `org/*` models with instant retries
pub fn test_config(sample_size: usize, batch_size: usize) -> JobConfig {
    JobConfig {
        base_model_id: "org/TLDR-Base".to_string(),
        ft_model_id: "org/TLDR-Base-PPO".to_string(),
        dataset_id: "trl-lib/tldr".to_string(),
        sample_size,
        batch_size,
        organization: "org".to_string(),
        retry: RetryPolicy::fixed(3, Duration::ZERO),
        ..JobConfig::default()
    }
}

#[allow(dead_code)]
pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
