//! OpenAI-compatible inference server backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use shared::{Stage, stage_debug};
use crate::config::ServiceEndpoints;
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::ModelBackend;
use crate::types::GenerationParams;

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [String],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    index: usize,
    text: String,
}

/// Sends batched completion requests to a server hosting both models
pub struct RealModelBackend {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    params: GenerationParams,
}

impl RealModelBackend {
    pub fn new(endpoints: &ServiceEndpoints, params: GenerationParams, api_key: Option<String>) -> CompletionsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(endpoints.inference_timeout)
            .build()
            .map_err(|e| CompletionsError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoints.inference_url.clone(),
            api_key,
            params,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Order choices by index and check there is exactly one per prompt
fn collect_choices(mut choices: Vec<Choice>, expected: usize, model_id: &str) -> CompletionsResult<Vec<String>> {
    choices.sort_by_key(|choice| choice.index);

    if choices.len() != expected || choices.iter().enumerate().any(|(i, choice)| choice.index != i) {
        return Err(CompletionsError::inference(
            model_id,
            format!("expected choices 0..{expected}, got {} choice(s)", choices.len()),
        ));
    }

    Ok(choices.into_iter().map(|choice| choice.text).collect())
}

#[async_trait]
impl ModelBackend for RealModelBackend {
    async fn load(&self, model_id: &str) -> CompletionsResult<()> {
        let unavailable = |reason: String| CompletionsError::ModelUnavailable {
            model: model_id.to_string(),
            reason,
        };

        let url = self.base_url.join("v1/models")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| unavailable(format!("inference server unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP {status}: {body}")));
        }

        let models: ModelList = response
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed model list: {e}")))?;

        if !models.data.iter().any(|entry| entry.id == model_id) {
            return Err(unavailable(format!("not served by {}", self.base_url)));
        }

        stage_debug!(Stage::Job, "Model {} is available", model_id);
        Ok(())
    }

    async fn generate_batch(&self, model_id: &str, prompts: &[String]) -> CompletionsResult<Vec<String>> {
        if prompts.is_empty() {
            return Ok(Vec::new());
        }

        let request_body = CompletionRequest {
            model: model_id,
            prompt: prompts,
            max_tokens: self.params.max_new_tokens,
            temperature: self.params.temperature,
        };

        let url = self.base_url.join("v1/completions")?;
        let response = self
            .authorize(self.client.post(url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CompletionsError::inference(model_id, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionsError::inference(model_id, format!("HTTP {status}: {body}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionsError::inference(model_id, format!("malformed completion response: {e}")))?;

        collect_choices(completion.choices, prompts.len(), model_id)
    }
}
