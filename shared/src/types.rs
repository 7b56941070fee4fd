//! Core shared types: the output table, its destination and the publish failure taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::errors::{SharedError, SharedResult};

/// Column names of the published table, in order
pub const COMPLETION_COLUMNS: [&str; 3] = ["prompt", "base_completion", "ft_completions"];

/// Stage of the job, attached to every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Startup, configuration and shutdown
    Job,
    /// Reading the prompt sample from the dataset
    LoadPrompts,
    /// Generating with the baseline model
    BaseInference,
    /// Generating with the fine-tuned model
    FtInference,
    /// Pushing the result table to the hub
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Job => write!(f, "job"),
            Stage::LoadPrompts => write!(f, "load_prompts"),
            Stage::BaseInference => write!(f, "base_inference"),
            Stage::FtInference => write!(f, "ft_inference"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

/// One prompt paired with the completions of both models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub prompt: String,
    #[serde(rename = "base_completion")]
    pub baseline_completion: String,
    #[serde(rename = "ft_completions")]
    pub fine_tuned_completion: String,
}

/// Ordered, immutable table of result rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTable {
    rows: Vec<ResultRow>,
}

impl CompletionTable {
    /// Zip three columns into rows, keeping input order.
    ///
    /// Every column must have as many values as `prompts`.
    pub fn from_columns(
        prompts: Vec<String>,
        base_completions: Vec<String>,
        ft_completions: Vec<String>,
    ) -> SharedResult<Self> {
        let expected = prompts.len();
        for (column, actual) in [
            (COMPLETION_COLUMNS[1], base_completions.len()),
            (COMPLETION_COLUMNS[2], ft_completions.len()),
        ] {
            if actual != expected {
                return Err(SharedError::ColumnLengthMismatch {
                    column: column.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let rows = prompts
            .into_iter()
            .zip(base_completions)
            .zip(ft_completions)
            .map(|((prompt, baseline_completion), fine_tuned_completion)| ResultRow {
                prompt,
                baseline_completion,
                fine_tuned_completion,
            })
            .collect();

        Ok(Self { rows })
    }

    pub fn column_names(&self) -> &'static [&'static str] {
        &COMPLETION_COLUMNS
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize as JSON Lines, one object per row
    pub fn to_jsonl(&self) -> SharedResult<String> {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the JSON Lines form to a local file, creating parent directories
    pub fn write_jsonl(&self, path: &Path) -> SharedResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.to_jsonl()?.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Where a table is published: a dataset repository and a split inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetDestination {
    repo_id: String,
    split: String,
}

impl DatasetDestination {
    /// `repo_id` must look like `owner/name`
    pub fn new(repo_id: impl Into<String>, split: impl Into<String>) -> SharedResult<Self> {
        let repo_id = repo_id.into();
        let split = split.into();

        let invalid = |reason: &str| SharedError::InvalidDestination {
            repo_id: repo_id.clone(),
            reason: reason.to_string(),
        };

        match repo_id.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => return Err(invalid("expected 'owner/name'")),
        }
        if repo_id.chars().any(char::is_whitespace) {
            return Err(invalid("must not contain whitespace"));
        }
        if split.is_empty() || split.contains('/') {
            return Err(SharedError::InvalidConfig {
                field: "split".to_string(),
                value: split,
            });
        }

        Ok(Self { repo_id, split })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    pub fn owner(&self) -> &str {
        self.repo_id.split_once('/').map(|(owner, _)| owner).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.repo_id.split_once('/').map(|(_, name)| name).unwrap_or(&self.repo_id)
    }

    /// Path of the split's data file inside the repository.
    ///
    /// Fixed per split so that re-publishing overwrites instead of adding a copy.
    pub fn data_path(&self) -> String {
        format!("data/{}.jsonl", self.split)
    }
}

impl fmt::Display for DatasetDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo_id, self.split)
    }
}

/// Failure reasons for a push to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishFailure {
    /// Token missing, invalid or lacking write access
    AuthenticationFailed,
    /// Destination rejected by the store (bad repo id, bad path)
    InvalidDestination(String),
    /// Any other client-side rejection (4xx)
    Rejected(String),
    /// Concurrent write to the same repository
    Conflict(String),
    /// Rate limit exceeded
    RateLimitExceeded,
    /// Network/connection error
    NetworkError(String),
    /// Request timeout
    Timeout,
    /// Server error from the store (5xx)
    ServerError(String),
    /// Service temporarily unavailable
    ServiceUnavailable,
    /// Unknown or unhandled error
    Unknown(String),
}

impl PublishFailure {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishFailure::AuthenticationFailed
            | PublishFailure::InvalidDestination(_)
            | PublishFailure::Rejected(_) => false,
            PublishFailure::Conflict(_)
            | PublishFailure::RateLimitExceeded
            | PublishFailure::NetworkError(_)
            | PublishFailure::Timeout
            | PublishFailure::ServerError(_)
            | PublishFailure::ServiceUnavailable
            | PublishFailure::Unknown(_) => true,
        }
    }
}

impl fmt::Display for PublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishFailure::AuthenticationFailed => write!(f, "authentication failed"),
            PublishFailure::InvalidDestination(msg) => write!(f, "invalid destination: {msg}"),
            PublishFailure::Rejected(msg) => write!(f, "rejected: {msg}"),
            PublishFailure::Conflict(msg) => write!(f, "conflict: {msg}"),
            PublishFailure::RateLimitExceeded => write!(f, "rate limit exceeded"),
            PublishFailure::NetworkError(msg) => write!(f, "network error: {msg}"),
            PublishFailure::Timeout => write!(f, "timeout"),
            PublishFailure::ServerError(msg) => write!(f, "server error: {msg}"),
            PublishFailure::ServiceUnavailable => write!(f, "service unavailable"),
            PublishFailure::Unknown(msg) => write!(f, "unknown error: {msg}"),
        }
    }
}
