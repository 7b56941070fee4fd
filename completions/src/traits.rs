//! Collaborator trait definitions for dependency injection

use async_trait::async_trait;

use shared::{CompletionTable, DatasetDestination, PublishFailure};
use crate::error::CompletionsResult;
use crate::types::DatasetSelection;

/// Source of the prompt sample
#[mockall::automock]
#[async_trait]
pub trait PromptSource: Send + Sync {
    /// Read the prompt field of the first `selection.limit` rows, in dataset order
    async fn load_prompts(&self, selection: &DatasetSelection) -> CompletionsResult<Vec<String>>;
}

/// Text-generation backend serving one or more models
#[mockall::automock]
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Resolve the model, failing if it cannot be served
    async fn load(&self, model_id: &str) -> CompletionsResult<()>;

    /// Generate one completion per prompt, in prompt order
    async fn generate_batch(&self, model_id: &str, prompts: &[String]) -> CompletionsResult<Vec<String>>;
}

/// Remote store accepting a table under a destination identity
#[mockall::automock]
#[async_trait]
pub trait HubPublisher: Send + Sync {
    /// Single upload attempt. Pushing to the same destination twice overwrites.
    async fn push(&self, table: &CompletionTable, destination: &DatasetDestination) -> Result<(), PublishFailure>;
}
