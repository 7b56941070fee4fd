//! Hugging Face Hub dataset publisher
//!
//! A push creates the dataset repository (already existing is fine), uploads the
//! table as `data/{split}.jsonl` and uploads a dataset card declaring the split.
//! Paths are fixed per split, so pushing again overwrites.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use url::Url;

use shared::{CompletionTable, DatasetDestination, PublishFailure, Stage, stage_debug};
use crate::config::ServiceEndpoints;
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::HubPublisher;

/// Token for hub writes, from `HF_TOKEN` or `HUGGING_FACE_HUB_TOKEN`
pub fn resolve_token() -> Option<String> {
    ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

/// Map a non-success hub response to a failure kind
pub fn classify_status(status: StatusCode, body: &str) -> PublishFailure {
    match status.as_u16() {
        401 | 403 => PublishFailure::AuthenticationFailed,
        404 => PublishFailure::InvalidDestination(format!("HTTP {status}: {body}")),
        400 | 413 | 422 => PublishFailure::Rejected(format!("HTTP {status}: {body}")),
        409 => PublishFailure::Conflict(format!("HTTP {status}: {body}")),
        408 => PublishFailure::Timeout,
        429 => PublishFailure::RateLimitExceeded,
        503 => PublishFailure::ServiceUnavailable,
        500..=599 => PublishFailure::ServerError(format!("HTTP {status}: {body}")),
        _ => PublishFailure::Unknown(format!("HTTP {status}: {body}")),
    }
}

fn classify_transport(error: reqwest::Error) -> PublishFailure {
    if error.is_timeout() {
        PublishFailure::Timeout
    } else {
        PublishFailure::NetworkError(error.to_string())
    }
}

/// Dataset card with the front matter the hub uses to find the split
pub fn dataset_card(table: &CompletionTable, destination: &DatasetDestination) -> String {
    let columns = table
        .column_names()
        .iter()
        .map(|name| format!("- `{name}`"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "---\nconfigs:\n- config_name: default\n  data_files:\n  - split: {split}\n    path: {path}\n---\n\n\
         # {name}\n\n\
         Paired completions from a base model and its fine-tuned counterpart, one row per prompt.\n\n\
         Columns:\n{columns}\n\n\
         Rows in `{split}`: {rows}\n\n\
         Generated {date}.\n",
        split = destination.split(),
        path = destination.data_path(),
        name = destination.name(),
        columns = columns,
        rows = table.len(),
        date = Utc::now().format("%Y-%m-%d"),
    )
}

/// Pushes tables to the hub over its HTTP API
pub struct RealHubPublisher {
    client: reqwest::Client,
    hub_url: Url,
    token: String,
    private: bool,
}

impl RealHubPublisher {
    pub fn new(endpoints: &ServiceEndpoints, token: String) -> CompletionsResult<Self> {
        if token.trim().is_empty() {
            return Err(CompletionsError::config("a hub token is required to publish"));
        }

        let client = reqwest::Client::builder()
            .timeout(endpoints.request_timeout)
            .build()
            .map_err(|e| CompletionsError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            hub_url: endpoints.hub_url.clone(),
            token,
            private: false,
        })
    }

    /// Create destination repositories as private
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, PublishFailure> {
        self.hub_url
            .join(path)
            .map_err(|e| PublishFailure::InvalidDestination(e.to_string()))
    }

    /// POST /api/repos/create; an existing repository is accepted
    async fn create_repo(&self, destination: &DatasetDestination) -> Result<(), PublishFailure> {
        let body = serde_json::json!({
            "name": destination.name(),
            "organization": destination.owner(),
            "type": "dataset",
            "private": self.private,
        });

        let response = self
            .client
            .post(self.endpoint("api/repos/create")?)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            stage_debug!(Stage::Publish, "Repository {} ready ({})", destination.repo_id(), status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    /// PUT /api/datasets/{repo_id}/upload/main/{path}
    async fn upload(&self, destination: &DatasetDestination, path_in_repo: &str, content: Vec<u8>) -> Result<(), PublishFailure> {
        let url = self.endpoint(&format!(
            "api/datasets/{}/upload/main/{}",
            destination.repo_id(),
            path_in_repo
        ))?;

        let size = content.len();
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        stage_debug!(Stage::Publish, "Uploaded {} ({} bytes)", path_in_repo, size);
        Ok(())
    }
}

#[async_trait]
impl HubPublisher for RealHubPublisher {
    async fn push(&self, table: &CompletionTable, destination: &DatasetDestination) -> Result<(), PublishFailure> {
        let data = table
            .to_jsonl()
            .map_err(|e| PublishFailure::Rejected(format!("table could not be serialized: {e}")))?;

        self.create_repo(destination).await?;
        self.upload(destination, &destination.data_path(), data.into_bytes()).await?;
        self.upload(destination, "README.md", dataset_card(table, destination).into_bytes())
            .await
    }
}
