//! In-memory collaborators for job pipeline tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use completions::types::DatasetSelection;
use completions::{CompletionsError, CompletionsResult, HubPublisher, ModelBackend, PromptSource};
use shared::{CompletionTable, DatasetDestination, PublishFailure};

/// Serves a fixed prompt list and records the selection it was asked for
pub struct StaticPromptSource {
    prompts: Vec<String>,
    pub requested: Mutex<Option<DatasetSelection>>,
}

impl StaticPromptSource {
    pub fn new(prompts: &[&str]) -> Self {
        Self {
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
            requested: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PromptSource for StaticPromptSource {
    async fn load_prompts(&self, selection: &DatasetSelection) -> CompletionsResult<Vec<String>> {
        *self.requested.lock().unwrap() = Some(selection.clone());
        Ok(self.prompts.iter().take(selection.limit).cloned().collect())
    }
}

/// Answers `"{model} says {prompt}"` and records every call
#[derive(Default)]
pub struct RecordingBackend {
    pub loads: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<(String, Vec<String>)>>,
    pub unavailable: Option<String>,
}

impl RecordingBackend {
    pub fn without(model: &str) -> Self {
        Self {
            unavailable: Some(model.to_string()),
            ..Self::default()
        }
    }

    pub fn batches_for(&self, model: &str) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, batch)| batch.clone())
            .collect()
    }
}

#[async_trait]
impl ModelBackend for RecordingBackend {
    async fn load(&self, model_id: &str) -> CompletionsResult<()> {
        self.loads.lock().unwrap().push(model_id.to_string());
        if self.unavailable.as_deref() == Some(model_id) {
            return Err(CompletionsError::ModelUnavailable {
                model: model_id.to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(())
    }

    async fn generate_batch(&self, model_id: &str, prompts: &[String]) -> CompletionsResult<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .push((model_id.to_string(), prompts.to_vec()));
        Ok(prompts.iter().map(|p| format!("{model_id} says {p}")).collect())
    }
}

/// Keeps the last pushed table; fails the first `failures` pushes
pub struct MemoryHub {
    failures: u32,
    failure: PublishFailure,
    pub calls: AtomicU32,
    pub stored: Mutex<Option<(DatasetDestination, CompletionTable)>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::failing(0, PublishFailure::ServiceUnavailable)
    }

    pub fn failing(failures: u32, failure: PublishFailure) -> Self {
        Self {
            failures,
            failure,
            calls: AtomicU32::new(0),
            stored: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HubPublisher for MemoryHub {
    async fn push(&self, table: &CompletionTable, destination: &DatasetDestination) -> Result<(), PublishFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(self.failure.clone());
        }
        *self.stored.lock().unwrap() = Some((destination.clone(), table.clone()));
        Ok(())
    }
}
