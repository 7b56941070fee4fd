//! Completions job error types

use thiserror::Error;
use shared::{PublishFailure, SharedError};

/// Result type for completions operations
pub type CompletionsResult<T> = Result<T, CompletionsError>;

/// Completions job error types
#[derive(Error, Debug)]
pub enum CompletionsError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Model '{model}' could not be loaded: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("Dataset '{dataset}' could not be read: {message}")]
    DatasetError { dataset: String, message: String },

    #[error("Inference failed for model '{model}': {message}")]
    InferenceError { model: String, message: String },

    #[error("Publishing to {destination} failed after {attempts} attempt(s): {reason}")]
    PublishError {
        destination: String,
        attempts: u32,
        reason: PublishFailure,
    },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

impl CompletionsError {
    pub fn config(message: impl Into<String>) -> Self {
        CompletionsError::ConfigError { message: message.into() }
    }

    pub fn dataset(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        CompletionsError::DatasetError {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    pub fn inference(model: impl Into<String>, message: impl Into<String>) -> Self {
        CompletionsError::InferenceError {
            model: model.into(),
            message: message.into(),
        }
    }

    /// The underlying publish failure, if this is a publish error
    pub fn publish_failure(&self) -> Option<&PublishFailure> {
        match self {
            CompletionsError::PublishError { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
