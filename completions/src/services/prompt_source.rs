//! Prompt loading from the hub datasets-server rows API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use shared::{Stage, stage_debug};
use crate::config::ServiceEndpoints;
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::PromptSource;
use crate::types::DatasetSelection;

/// Largest page the rows API serves
pub const ROWS_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row_idx: usize,
    row: Map<String, Value>,
}

/// Reads prompts page by page, in dataset order
pub struct RealPromptSource {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl RealPromptSource {
    pub fn new(endpoints: &ServiceEndpoints, token: Option<String>) -> CompletionsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(endpoints.request_timeout)
            .build()
            .map_err(|e| CompletionsError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoints.datasets_server_url.clone(),
            token,
        })
    }

    fn rows_url(&self, selection: &DatasetSelection, offset: usize, length: usize) -> CompletionsResult<Url> {
        let mut url = self.base_url.join("rows")?;
        url.query_pairs_mut()
            .append_pair("dataset", &selection.dataset_id)
            .append_pair("config", &selection.config)
            .append_pair("split", &selection.split)
            .append_pair("offset", &offset.to_string())
            .append_pair("length", &length.to_string());
        Ok(url)
    }

    async fn fetch_page(&self, selection: &DatasetSelection, offset: usize, length: usize) -> CompletionsResult<RowsPage> {
        let url = self.rows_url(selection, offset, length)?;
        stage_debug!(Stage::LoadPrompts, "GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CompletionsError::dataset(&selection.dataset_id, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionsError::config(format!(
                    "access to dataset '{}' denied (HTTP {status}); check HF_TOKEN",
                    selection.dataset_id
                )),
                StatusCode::NOT_FOUND => CompletionsError::config(format!(
                    "dataset '{}' has no config '{}' with split '{}': {body}",
                    selection.dataset_id, selection.config, selection.split
                )),
                _ => CompletionsError::dataset(&selection.dataset_id, format!("HTTP {status}: {body}")),
            });
        }

        response
            .json::<RowsPage>()
            .await
            .map_err(|e| CompletionsError::dataset(&selection.dataset_id, format!("malformed rows response: {e}")))
    }
}

/// Pull the prompt field out of one row
fn extract_prompt(entry: &RowEntry, selection: &DatasetSelection) -> CompletionsResult<String> {
    match entry.row.get(&selection.prompt_field) {
        Some(Value::String(prompt)) => Ok(prompt.clone()),
        Some(other) => Err(CompletionsError::config(format!(
            "field '{}' in row {} of '{}' is not a string: {other}",
            selection.prompt_field, entry.row_idx, selection.dataset_id
        ))),
        None => Err(CompletionsError::config(format!(
            "field '{}' not found in row {} of '{}'",
            selection.prompt_field, entry.row_idx, selection.dataset_id
        ))),
    }
}

#[async_trait]
impl PromptSource for RealPromptSource {
    async fn load_prompts(&self, selection: &DatasetSelection) -> CompletionsResult<Vec<String>> {
        let mut prompts = Vec::with_capacity(selection.limit);
        let mut offset = 0;

        while prompts.len() < selection.limit {
            let length = (selection.limit - prompts.len()).min(ROWS_PAGE_SIZE);
            let page = self.fetch_page(selection, offset, length).await?;

            if let Some(total) = page.num_rows_total {
                if total < selection.limit {
                    return Err(CompletionsError::config(format!(
                        "sample size {} exceeds the {} rows of '{}' [{}]",
                        selection.limit, total, selection.dataset_id, selection.split
                    )));
                }
            }
            if page.rows.is_empty() {
                break;
            }

            for entry in page.rows.iter().take(length) {
                prompts.push(extract_prompt(entry, selection)?);
            }
            offset += page.rows.len().min(length);
        }

        if prompts.len() < selection.limit {
            return Err(CompletionsError::config(format!(
                "sample size {} exceeds the {} rows of '{}' [{}]",
                selection.limit,
                prompts.len(),
                selection.dataset_id,
                selection.split
            )));
        }

        Ok(prompts)
    }
}
