//! Batched response generation

use std::sync::Arc;
use std::time::Instant;

use shared::{Stage, stage_debug, stage_info};
use crate::core::utils::partition_batches;
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::ModelBackend;

/// Runs a prompt list through a model in fixed-size batches
pub struct ResponseGenerator<M>
where
    M: ModelBackend + 'static,
{
    backend: Arc<M>,
    stage: Stage,
}

impl<M> ResponseGenerator<M>
where
    M: ModelBackend + 'static,
{
    pub fn new(backend: Arc<M>) -> Self {
        Self {
            backend,
            stage: Stage::Job,
        }
    }

    /// Same backend, logging under another stage
    pub fn in_stage(&self, stage: Stage) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            stage,
        }
    }

    /// Produce one completion per prompt, in prompt order.
    ///
    /// The model is loaded first; a load failure is returned as-is and nothing is generated.
    /// Each chunk of at most `batch_size` prompts is a single backend call. Failures are
    /// not retried.
    pub async fn generate(&self, prompts: &[String], model_id: &str, batch_size: usize) -> CompletionsResult<Vec<String>> {
        let batches = partition_batches(prompts, batch_size)?;

        self.backend.load(model_id).await?;

        stage_info!(
            self.stage,
            "🧠 Generating {} completions with {} in {} batch(es) of up to {}",
            prompts.len(),
            model_id,
            batches.len(),
            batch_size
        );

        let started = Instant::now();
        let mut completions = Vec::with_capacity(prompts.len());

        for (index, batch) in batches.iter().enumerate() {
            stage_debug!(self.stage, "📦 Batch {}/{} ({} prompts)", index + 1, batches.len(), batch.len());

            let outputs = self.backend.generate_batch(model_id, batch).await?;
            if outputs.len() != batch.len() {
                return Err(CompletionsError::inference(
                    model_id,
                    format!(
                        "batch {} returned {} completions for {} prompts",
                        index + 1,
                        outputs.len(),
                        batch.len()
                    ),
                ));
            }
            completions.extend(outputs);
        }

        stage_info!(
            self.stage,
            "✅ {} completions from {} in {:.1}s",
            completions.len(),
            model_id,
            started.elapsed().as_secs_f64()
        );

        Ok(completions)
    }
}
